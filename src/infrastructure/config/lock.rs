//! Run lock configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// What to do when the wait window elapses while another live run holds the lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPolicy {
    /// Stop before any destructive work.
    #[default]
    Fail,
    /// Keep waiting, logging progress every interval.
    Wait,
    /// Remove the other run's lock and proceed.
    Force,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Bounded wait window in seconds.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub on_timeout: LockPolicy,
}

fn default_path() -> PathBuf {
    PathBuf::from("/var/run/stackwarden.lock")
}

const fn default_wait_secs() -> u64 {
    60
}

const fn default_interval_secs() -> u64 {
    2
}

impl LockConfig {
    #[must_use]
    pub const fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            wait_secs: default_wait_secs(),
            interval_secs: default_interval_secs(),
            on_timeout: LockPolicy::default(),
        }
    }
}
