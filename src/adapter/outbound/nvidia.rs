//! Accelerator status from `nvidia-smi`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::adapter::outbound::exec;
use crate::port::outbound::{Accelerator, AcceleratorDevice, AcceleratorStatus};

const QUERY: &str = "--query-gpu=name,memory.total,memory.used,driver_version";
const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Default)]
pub struct NvidiaSmi;

/// Parse `--format=csv,noheader,nounits` rows of [`QUERY`].
#[must_use]
pub fn parse_query(output: &str) -> AcceleratorStatus {
    let mut driver = None;
    let devices: Vec<AcceleratorDevice> = output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [name, total, used, version] = fields.as_slice() else {
                return None;
            };
            if driver.is_none() && !version.is_empty() {
                driver = Some((*version).to_string());
            }
            Some(AcceleratorDevice {
                name: (*name).to_string(),
                memory_total_mib: total.parse().unwrap_or(0),
                memory_used_mib: used.parse().unwrap_or(0),
            })
        })
        .collect();

    if devices.is_empty() {
        AcceleratorStatus::Absent
    } else {
        AcceleratorStatus::Present { driver, devices }
    }
}

#[async_trait]
impl Accelerator for NvidiaSmi {
    async fn status(&self) -> AcceleratorStatus {
        match exec::run("nvidia-smi", &[QUERY, "--format=csv,noheader,nounits"], TIMEOUT).await {
            Ok(captured) if captured.success => parse_query(&captured.stdout),
            Ok(captured) => {
                debug!(error = %captured.diagnostic(), "nvidia-smi query failed");
                AcceleratorStatus::Absent
            }
            Err(error) => {
                debug!(error = %error, "nvidia-smi unavailable");
                AcceleratorStatus::Absent
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devices_and_driver() {
        let output = "NVIDIA GeForce RTX 4090, 24564, 1024, 550.54.14\n\
                      NVIDIA GeForce RTX 3060, 12288, 0, 550.54.14\n";
        let AcceleratorStatus::Present { driver, devices } = parse_query(output) else {
            panic!("expected devices");
        };
        assert_eq!(driver.as_deref(), Some("550.54.14"));
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "NVIDIA GeForce RTX 4090");
        assert_eq!(devices[0].memory_total_mib, 24564);
        assert_eq!(devices[1].memory_used_mib, 0);
    }

    #[test]
    fn empty_or_garbled_output_means_absent() {
        assert_eq!(parse_query(""), AcceleratorStatus::Absent);
        assert_eq!(
            parse_query("NVIDIA-SMI has failed because it couldn't communicate"),
            AcceleratorStatus::Absent
        );
    }
}
