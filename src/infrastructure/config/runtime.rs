//! Native runtime and derivation configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::service::ProbeConfig;
use crate::domain::Overlay;

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// systemd unit name.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Runtime binary, resolved through `PATH` when relative.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Command-line fragment identifying stray runtime processes.
    #[serde(default = "default_process_pattern")]
    pub process_pattern: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address injected as the runtime host; `0.0.0.0` exposes it on the LAN.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_release_feed")]
    pub release_feed: String,
    /// Opaque install/upgrade action, run through `sh -c`.
    #[serde(default = "default_install_command")]
    pub install_command: String,
    #[serde(default = "default_install_timeout_secs")]
    pub install_timeout_secs: u64,
    /// systemd drop-in holding the persistent environment.
    #[serde(default = "default_override_path")]
    pub override_path: PathBuf,
    #[serde(default = "default_num_parallel")]
    pub num_parallel: u32,
    #[serde(default = "default_max_loaded_models")]
    pub max_loaded_models: u32,
    #[serde(default = "default_true")]
    pub flash_attention: bool,
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
    /// Additional environment written into the override verbatim.
    #[serde(default)]
    pub extra_env: BTreeMap<String, String>,
    #[serde(default = "default_health")]
    pub health: ProbeConfig,
    /// Models warmed up after the runtime becomes healthy.
    #[serde(default)]
    pub preload: Vec<String>,
}

fn default_unit() -> String {
    "ollama".into()
}

fn default_binary() -> String {
    "ollama".into()
}

fn default_process_pattern() -> String {
    "ollama serve".into()
}

pub const DEFAULT_PORT: u16 = 11434;

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_host() -> String {
    "0.0.0.0".into()
}

fn default_release_feed() -> String {
    "https://api.github.com/repos/ollama/ollama/releases/latest".into()
}

fn default_install_command() -> String {
    "curl -fsSL https://ollama.com/install.sh | sh".into()
}

const fn default_install_timeout_secs() -> u64 {
    600
}

fn default_override_path() -> PathBuf {
    PathBuf::from("/etc/systemd/system/ollama.service.d/override.conf")
}

const fn default_num_parallel() -> u32 {
    4
}

const fn default_max_loaded_models() -> u32 {
    2
}

const fn default_true() -> bool {
    true
}

fn default_keep_alive() -> String {
    "24h".into()
}

const fn default_health() -> ProbeConfig {
    ProbeConfig {
        attempts: 30,
        interval_secs: 1,
    }
}

impl RuntimeConfig {
    /// Loopback base URL of the runtime API.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    #[must_use]
    pub const fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            binary: default_binary(),
            process_pattern: default_process_pattern(),
            port: default_port(),
            bind_host: default_bind_host(),
            release_feed: default_release_feed(),
            install_command: default_install_command(),
            install_timeout_secs: default_install_timeout_secs(),
            override_path: default_override_path(),
            num_parallel: default_num_parallel(),
            max_loaded_models: default_max_loaded_models(),
            flash_attention: default_true(),
            keep_alive: default_keep_alive(),
            extra_env: BTreeMap::new(),
            health: default_health(),
            preload: Vec::new(),
        }
    }
}

/// Accelerator-maximized derivation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DerivationConfig {
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default = "default_num_gpu")]
    pub num_gpu: u32,
    /// Defaults to the number of logical CPUs.
    #[serde(default = "default_num_thread")]
    pub num_thread: u32,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_suffix() -> String {
    "maxgpu".into()
}

const fn default_num_gpu() -> u32 {
    999
}

fn default_num_thread() -> u32 {
    u32::try_from(num_cpus::get()).unwrap_or(u32::MAX)
}

const fn default_num_ctx() -> u32 {
    8192
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_repeat_penalty() -> f64 {
    1.1
}

const fn default_timeout_secs() -> u64 {
    120
}

impl DerivationConfig {
    #[must_use]
    pub fn overlay(&self) -> Overlay {
        Overlay {
            num_gpu: self.num_gpu,
            num_thread: self.num_thread,
            num_ctx: self.num_ctx,
            temperature: self.temperature,
            top_p: self.top_p,
            repeat_penalty: self.repeat_penalty,
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            num_gpu: default_num_gpu(),
            num_thread: default_num_thread(),
            num_ctx: default_num_ctx(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
