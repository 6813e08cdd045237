//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use tracing::info;

use crate::adapter::outbound::docker::{DockerCli, HttpRegistry};
use crate::adapter::outbound::github::GithubReleases;
use crate::adapter::outbound::host::{HostProcessTable, ReqwestProbe, TcpPortProbe};
use crate::adapter::outbound::nvidia::NvidiaSmi;
use crate::adapter::outbound::ollama::{OllamaApi, SystemdRuntime};
use crate::application::orchestration::context::Drivers;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Wire the production adapter behind every outbound port.
///
/// # Errors
///
/// Fails when the runtime API URL cannot be parsed.
pub fn build_drivers(config: &Config) -> Result<Drivers> {
    let timeout = config.http_timeout();
    let runtime = &config.runtime;

    let drivers = Drivers {
        runtime: Arc::new(SystemdRuntime::new(runtime)),
        runtime_api: Arc::new(OllamaApi::new(&runtime.api_url(), timeout)?),
        containers: Arc::new(DockerCli::new(runtime.install_timeout())),
        releases: Arc::new(GithubReleases::new(runtime.release_feed.clone(), timeout)),
        registry: Arc::new(HttpRegistry::new(timeout)),
        processes: Arc::new(HostProcessTable::new()),
        ports: Arc::new(TcpPortProbe::new(timeout)),
        http: Arc::new(ReqwestProbe::new(timeout)),
        accelerator: Arc::new(NvidiaSmi),
    };
    info!(
        runtime = %runtime.api_url(),
        container = %config.container.name,
        "Drivers initialized"
    );
    Ok(drivers)
}
