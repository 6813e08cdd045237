//! Web front-end container configuration.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::service::ProbeConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Tracked image reference including tag.
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_host_port")]
    pub host_port: u16,
    #[serde(default = "default_container_port")]
    pub container_port: u16,
    /// Named volume holding persistent front-end data. Never removed.
    #[serde(default = "default_data_volume")]
    pub data_volume: String,
    #[serde(default = "default_data_path")]
    pub data_path: String,
    /// Environment key carrying the asset directory path inside the container.
    #[serde(default = "default_asset_env")]
    pub asset_env: String,
    #[serde(default = "default_runtime_url_env")]
    pub runtime_url_env: String,
    /// Runtime URL handed to the container. Empty means derived from
    /// `runtime.port` when the configuration is loaded.
    #[serde(default)]
    pub runtime_url: String,
    /// Request accelerator access for the container when one is present.
    #[serde(default = "default_true")]
    pub gpus: bool,
    #[serde(default = "default_restart")]
    pub restart: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_health")]
    pub health: ProbeConfig,
    #[serde(default)]
    pub extra_env: BTreeMap<String, String>,
}

fn default_name() -> String {
    "open-webui".into()
}

fn default_image() -> String {
    "ghcr.io/open-webui/open-webui:main".into()
}

const fn default_host_port() -> u16 {
    3000
}

const fn default_container_port() -> u16 {
    8080
}

fn default_data_volume() -> String {
    "open-webui".into()
}

fn default_data_path() -> String {
    "/app/backend/data".into()
}

fn default_asset_env() -> String {
    "OLLAMA_MODELS".into()
}

fn default_runtime_url_env() -> String {
    "OLLAMA_BASE_URL".into()
}

/// Runtime address as seen from inside the container.
#[must_use]
pub fn runtime_url_for(port: u16) -> String {
    format!("http://host.docker.internal:{port}")
}

const fn default_true() -> bool {
    true
}

fn default_restart() -> String {
    "always".into()
}

fn default_health_path() -> String {
    "/health".into()
}

const fn default_health() -> ProbeConfig {
    ProbeConfig {
        attempts: 60,
        interval_secs: 2,
    }
}

impl ContainerConfig {
    /// Loopback URL of the front-end health endpoint.
    #[must_use]
    pub fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.host_port, self.health_path)
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            image: default_image(),
            host_port: default_host_port(),
            container_port: default_container_port(),
            data_volume: default_data_volume(),
            data_path: default_data_path(),
            asset_env: default_asset_env(),
            runtime_url_env: default_runtime_url_env(),
            runtime_url: runtime_url_for(super::runtime::DEFAULT_PORT),
            gpus: default_true(),
            restart: default_restart(),
            health_path: default_health_path(),
            health: default_health(),
            extra_env: BTreeMap::new(),
        }
    }
}
