//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. The file
//! is optional: a missing file yields defaults. When loading, environment
//! variables override the asset directory hint and the invoking user;
//! [`Config::parse_toml`] leaves the environment alone.
//!
//! # Example
//!
//! ```no_run
//! use stackwarden::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default("/etc/stackwarden/config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::assets::AssetsConfig;
use super::container::{runtime_url_for, ContainerConfig};
use super::lock::LockConfig;
use super::logging::LoggingConfig;
use super::runtime::{DerivationConfig, RuntimeConfig};
use super::service::{ProbeConfig, ReclaimConfig, ReportConfig};
use crate::domain::ImageRef;
use crate::error::{ConfigError, Result};

/// Asset directory hint variables, first match wins.
pub const ASSET_HINT_VARS: [&str; 2] = ["STACKWARDEN_MODELS_DIR", "OLLAMA_MODELS"];

/// Invoking-user variables, first match wins.
pub const USER_VARS: [&str; 2] = ["STACKWARDEN_USER", "SUDO_USER"];

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/stackwarden/config.toml";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub derivation: DerivationConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub reclaim: ReclaimConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Timeout for feed, registry and API requests in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Unprivileged user whose home anchors the first asset candidate.
    #[serde(skip)]
    pub invoking_user: Option<String>,
}

const fn default_http_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Parse and validate TOML content without consulting the environment.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.fill_derived();
        config.validate()?;
        Ok(config)
    }

    fn with_process_env(mut self) -> Self {
        self.apply_env(|key| std::env::var(key).ok());
        self
    }

    /// Settings that default from other sections.
    fn fill_derived(&mut self) {
        if self.container.runtime_url.trim().is_empty() {
            self.container.runtime_url = runtime_url_for(self.runtime.port);
        }
    }

    /// Load configuration from a TOML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content).map(Self::with_process_env)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        Self::parse_toml("").map(Self::with_process_env)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(hint) = ASSET_HINT_VARS.iter().find_map(|key| non_empty(key)) {
            self.assets.hint = Some(PathBuf::from(hint));
        }

        self.invoking_user = USER_VARS
            .iter()
            .find_map(|key| non_empty(key))
            .filter(|user| user != "root");
    }

    fn validate(&self) -> Result<()> {
        if self.runtime.port == 0 {
            return Err(invalid("runtime.port", "must be non-zero"));
        }
        if self.container.host_port == 0 || self.container.container_port == 0 {
            return Err(invalid("container.host_port", "ports must be non-zero"));
        }
        if self.container.host_port == self.runtime.port {
            return Err(invalid(
                "container.host_port",
                "must differ from runtime.port",
            ));
        }
        ImageRef::parse(&self.container.image)?;
        if self.derivation.suffix.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "derivation.suffix",
            }
            .into());
        }
        if self.derivation.suffix.contains(':') {
            return Err(invalid("derivation.suffix", "must not contain ':'"));
        }
        for (field, probe) in [
            ("runtime.health", self.runtime.health),
            ("container.health", self.container.health),
        ] {
            validate_probe(field, probe)?;
        }
        if self.lock.interval_secs == 0 {
            return Err(invalid("lock.interval_secs", "must be at least 1"));
        }
        if self.http_timeout_secs == 0 {
            return Err(invalid("http_timeout_secs", "must be at least 1"));
        }
        if self.reclaim.attempts == 0 {
            return Err(invalid("reclaim.attempts", "must be at least 1"));
        }
        Ok(())
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            lock: LockConfig::default(),
            assets: AssetsConfig::default(),
            runtime: RuntimeConfig::default(),
            derivation: DerivationConfig::default(),
            container: ContainerConfig::default(),
            reclaim: ReclaimConfig::default(),
            report: ReportConfig::default(),
            http_timeout_secs: default_http_timeout_secs(),
            invoking_user: None,
        }
    }
}

fn validate_probe(field: &'static str, probe: ProbeConfig) -> Result<()> {
    if probe.attempts == 0 {
        return Err(invalid(field, "attempts must be at least 1"));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}
