//! Shared service settings: health probing, resource reclamation, reporting.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Bounded polling window for a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProbeConfig {
    pub attempts: u32,
    pub interval_secs: u64,
}

impl ProbeConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Port and process reclamation tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ReclaimConfig {
    /// Loopback connection attempts in `verify_free`.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Pause between reclamation methods so the kernel can release the socket.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Grace period between graceful and forceful termination.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

const fn default_attempts() -> u32 {
    5
}

const fn default_settle_ms() -> u64 {
    1000
}

const fn default_grace_secs() -> u64 {
    3
}

impl ReclaimConfig {
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[must_use]
    pub const fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            settle_ms: default_settle_ms(),
            grace_secs: default_grace_secs(),
        }
    }
}

/// Final report settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// JSON copy of the last run report. `None` disables it.
    #[serde(default = "default_status_file")]
    pub status_file: Option<PathBuf>,
}

fn default_status_file() -> Option<PathBuf> {
    Some(PathBuf::from("/var/lib/stackwarden/last-run.json"))
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            status_file: default_status_file(),
        }
    }
}
