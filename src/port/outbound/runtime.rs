//! Native inference runtime ports.
//!
//! [`RuntimeService`] covers the host-level service (install, systemd unit,
//! environment override, transient instances); [`RuntimeApi`] covers the
//! runtime's own local HTTP API.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{DerivedModelAsset, ModelAsset};
use crate::error::Result;

/// Ordered environment assignments injected into the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
    vars: Vec<(String, String)>,
}

impl RuntimeEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an earlier assignment.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((key, value)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Host-level control of the runtime service.
#[async_trait]
pub trait RuntimeService: Send + Sync {
    /// Installed version string as reported by the binary, `None` if not installed.
    async fn installed_version(&self) -> Result<Option<String>>;

    /// Run the opaque install/upgrade action.
    async fn install(&self) -> Result<()>;

    /// Whether the service manager reports the unit as active.
    async fn is_active(&self) -> Result<bool>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Persist `env` as a service-level override so it survives restarts
    /// outside this tool. Returns `true` when the stored content changed.
    async fn apply_environment(&self, env: &RuntimeEnv) -> Result<bool>;

    /// Spawn a detached runtime instance with `env`; returns its pid.
    async fn spawn_transient(&self, env: &RuntimeEnv) -> Result<u32>;
}

/// The runtime's local HTTP API.
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// Version reported by the running server.
    async fn version(&self) -> Result<String>;

    async fn list_models(&self) -> Result<Vec<ModelAsset>>;

    /// Materialize `asset` from its base plus overlay, bounded by `timeout`.
    async fn create_derived(&self, asset: &DerivedModelAsset, timeout: Duration) -> Result<()>;

    /// Load `model` into memory and keep it resident for `keep_alive`.
    async fn preload(&self, model: &str, keep_alive: &str) -> Result<()>;
}
