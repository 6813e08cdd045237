//! End-of-run status report.
//!
//! Everything here is observed fresh: both services are re-probed, the asset
//! inventory is recounted and the accelerator queried again, so the report
//! reflects the stack as it is rather than what the run believed.

use std::fs;
use std::net::{IpAddr, UdpSocket};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::application::directory::inventory;
use crate::application::orchestration::context::Drivers;
use crate::domain::{AssetDirectory, PhaseOutcome, ServiceKind, ServiceState, VersionState};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::AcceleratorStatus;

const ALL_INTERFACES: &str = "0.0.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceReport {
    pub kind: ServiceKind,
    pub state: ServiceState,
    pub endpoint: String,
    /// Reachable address on the local network, when the service listens there.
    pub lan_endpoint: Option<String>,
    pub version: Option<VersionState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub runtime: ServiceReport,
    pub web: ServiceReport,
    pub assets: Option<AssetDirectory>,
    pub accelerator: AcceleratorStatus,
    pub phases: Vec<PhaseOutcome>,
    pub cancelled: bool,
    pub remediation: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn with_versions(mut self, runtime: Option<VersionState>, web: Option<VersionState>) -> Self {
        self.runtime.version = runtime;
        self.web.version = web;
        self
    }

    #[must_use]
    pub fn with_phases(mut self, phases: Vec<PhaseOutcome>, cancelled: bool) -> Self {
        self.phases = phases;
        self.cancelled = cancelled;
        self
    }

    /// Whether every phase succeeded or was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.phases.iter().all(PhaseOutcome::is_clean)
    }

    /// Both services up and answering.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.runtime.state.is_healthy() && self.web.state.is_healthy()
    }
}

/// Collects a [`RunReport`] from live observations.
pub struct StatusReporter<'a> {
    config: &'a Config,
    drivers: &'a Drivers,
}

impl<'a> StatusReporter<'a> {
    #[must_use]
    pub const fn new(config: &'a Config, drivers: &'a Drivers) -> Self {
        Self { config, drivers }
    }

    pub async fn collect(&self, command: &str, assets: Option<&AssetDirectory>) -> RunReport {
        let lan = lan_address();
        let runtime = self.observe_runtime(lan).await;
        let web = self.observe_web(lan).await;
        let assets = assets.map(recount);
        let accelerator = self.drivers.accelerator.status().await;

        RunReport {
            generated_at: Utc::now(),
            command: command.to_string(),
            runtime,
            web,
            assets,
            accelerator,
            phases: Vec::new(),
            cancelled: false,
            remediation: remediation(self.config),
        }
    }

    async fn observe_runtime(&self, lan: Option<IpAddr>) -> ServiceReport {
        let config = &self.config.runtime;
        let present = matches!(self.drivers.runtime.installed_version().await, Ok(Some(_)));
        let running = matches!(self.drivers.runtime.is_active().await, Ok(true))
            || self.drivers.ports.is_occupied(config.port).await;
        let responding = self
            .drivers
            .http
            .is_live(&format!("{}/", config.api_url()))
            .await;

        let lan_endpoint = if config.bind_host == ALL_INTERFACES {
            lan.map(|ip| format!("http://{ip}:{}", config.port))
        } else {
            None
        };

        ServiceReport {
            kind: ServiceKind::Runtime,
            state: ServiceState::observe(present, running, responding),
            endpoint: config.api_url(),
            lan_endpoint,
            version: None,
        }
    }

    async fn observe_web(&self, lan: Option<IpAddr>) -> ServiceReport {
        let config = &self.config.container;
        let (present, running) = match self.drivers.containers.inspect(&config.name).await {
            Ok(Some(info)) => (true, info.running),
            Ok(None) => (false, false),
            Err(error) => {
                debug!(error = %error, "Container inspection failed during report");
                (false, false)
            }
        };
        let responding = self.drivers.http.is_live(&config.health_url()).await;

        ServiceReport {
            kind: ServiceKind::Container,
            state: ServiceState::observe(present, running, responding),
            endpoint: format!("http://127.0.0.1:{}", config.host_port),
            lan_endpoint: lan.map(|ip| format!("http://{ip}:{}", config.host_port)),
            version: None,
        }
    }
}

fn recount(assets: &AssetDirectory) -> AssetDirectory {
    let (manifests, blobs) = inventory(assets.path());
    AssetDirectory::new(assets.path().to_path_buf(), manifests, blobs, assets.origin())
}

/// Commands an operator can run when something is wrong.
#[must_use]
pub fn remediation(config: &Config) -> Vec<String> {
    let unit = &config.runtime.unit;
    let name = &config.container.name;
    vec![
        format!("systemctl status {unit}"),
        format!("journalctl -u {unit} -n 100"),
        format!("docker logs {name}"),
        format!("docker restart {name}"),
    ]
}

/// Primary outbound interface address.
///
/// Connecting a UDP socket sends nothing; it only selects the route.
#[must_use]
pub fn lan_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

/// Persist the report as pretty JSON, creating parent directories.
pub fn write_status_file(path: &Path, report: &RunReport) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(report)?;
    fs::write(path, body)?;
    info!(path = %path.display(), "Status file written");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OutcomeStatus, Phase};

    fn service(kind: ServiceKind, state: ServiceState) -> ServiceReport {
        ServiceReport {
            kind,
            state,
            endpoint: "http://127.0.0.1:1".into(),
            lan_endpoint: None,
            version: None,
        }
    }

    fn report() -> RunReport {
        RunReport {
            generated_at: Utc::now(),
            command: "run".into(),
            runtime: service(ServiceKind::Runtime, ServiceState::RunningResponding),
            web: service(ServiceKind::Container, ServiceState::Stopped),
            assets: None,
            accelerator: AcceleratorStatus::Absent,
            phases: Vec::new(),
            cancelled: false,
            remediation: remediation(&Config::default()),
        }
    }

    #[test]
    fn remediation_names_unit_and_container() {
        let commands = remediation(&Config::default());
        assert!(commands.contains(&"systemctl status ollama".to_string()));
        assert!(commands.contains(&"docker logs open-webui".to_string()));
    }

    #[test]
    fn degraded_phase_makes_report_unclean() {
        let report = report().with_phases(
            vec![
                PhaseOutcome::success(Phase::Lock, "held"),
                PhaseOutcome::degraded(Phase::ContainerStart, "timeout"),
            ],
            false,
        );
        assert!(!report.is_clean());
        assert!(!report.is_healthy());
        assert_eq!(report.phases[1].status, OutcomeStatus::Degraded);
    }

    #[test]
    fn status_file_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/last-run.json");
        write_status_file(&path, &report()).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["command"], "run");
        assert_eq!(value["runtime"]["state"], "running_responding");
        assert_eq!(value["accelerator"]["state"], "absent");
    }
}
