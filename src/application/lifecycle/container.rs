//! Web front-end container lifecycle.
//!
//! The persistent data volume is never removed: replacing the container only
//! ever stops and removes the container itself.

use tracing::{info, warn};

use crate::application::health::{wait_ready, Readiness};
use crate::application::orchestration::context::RunContext;
use crate::domain::{AssetDirectory, ImageRef, LifecycleState, Phase, PhaseOutcome};
use crate::error::Result;
use crate::infrastructure::config::container::ContainerConfig;
use crate::port::outbound::{ContainerInfo, ContainerSpec};

/// Container creation parameters for the resolved asset directory.
pub fn container_spec(
    config: &ContainerConfig,
    assets: &AssetDirectory,
    gpus: bool,
) -> Result<ContainerSpec> {
    let dir = assets.display_path();
    let mut env = vec![
        (config.asset_env.clone(), dir.clone()),
        (config.runtime_url_env.clone(), config.runtime_url.clone()),
    ];
    env.extend(
        config
            .extra_env
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    Ok(ContainerSpec {
        name: config.name.clone(),
        image: ImageRef::parse(&config.image)?,
        ports: vec![(config.host_port, config.container_port)],
        volumes: vec![
            (config.data_volume.clone(), config.data_path.clone()),
            (dir.clone(), dir),
        ],
        env,
        extra_hosts: vec!["host.docker.internal:host-gateway".into()],
        gpus,
        restart: config.restart.clone(),
    })
}

/// Why an existing container no longer matches the resolved asset directory.
#[must_use]
pub fn drift(info: &ContainerInfo, config: &ContainerConfig, assets: &AssetDirectory) -> Option<String> {
    let dir = assets.display_path();
    match info.mount_source(&dir) {
        Some(source) if source == dir => {}
        Some(source) => return Some(format!("asset mount points at {source}, expected {dir}")),
        None => return Some(format!("asset directory {dir} is not mounted")),
    }
    match info.env_value(&config.asset_env) {
        Some(value) if value == dir => None,
        Some(value) => Some(format!("{}={value}, expected {dir}", config.asset_env)),
        None => Some(format!("{} is not set", config.asset_env)),
    }
}

pub struct ContainerLifecycle<'a> {
    ctx: &'a RunContext,
    gpus: bool,
}

impl<'a> ContainerLifecycle<'a> {
    /// `gpus` requests accelerator access for newly created containers.
    #[must_use]
    pub const fn new(ctx: &'a RunContext, gpus: bool) -> Self {
        Self { ctx, gpus }
    }

    fn config(&self) -> &ContainerConfig {
        &self.ctx.config.container
    }

    /// Stop the container and clear its host port.
    pub async fn reclaim(&self) -> PhaseOutcome {
        let config = self.config();
        let engine = &self.ctx.drivers.containers;
        match engine.inspect(&config.name).await {
            Ok(Some(info)) if info.running => {
                if let Err(error) = engine.stop(&config.name).await {
                    warn!(error = %error, "Container stop failed, reclaiming port anyway");
                }
            }
            Ok(_) => {}
            Err(error) => warn!(error = %error, "Container inspection failed"),
        }
        self.ctx.reclaimer.reclaim_port(config.host_port).await;
        PhaseOutcome::success(
            Phase::ContainerReclaim,
            format!("container stopped, port {} reclaimed", config.host_port),
        )
    }

    /// Pull the tracked image.
    pub async fn update(&self) -> PhaseOutcome {
        let image = match ImageRef::parse(&self.config().image) {
            Ok(image) => image,
            Err(error) => return PhaseOutcome::failed(Phase::ContainerUpdate, error.to_string()),
        };
        match self.ctx.drivers.containers.pull(&image).await {
            Ok(()) => PhaseOutcome::success(Phase::ContainerUpdate, format!("pulled {image}")),
            Err(error) => {
                warn!(error = %error, "Image pull failed");
                PhaseOutcome::failed(Phase::ContainerUpdate, error.to_string())
            }
        }
    }

    /// Make sure the container runs the right configuration and answers.
    ///
    /// `recreate` replaces an existing container (after an image update).
    pub async fn ensure_running(&self, recreate: bool) -> (PhaseOutcome, LifecycleState) {
        let config = self.config();
        let engine = &self.ctx.drivers.containers;
        let url = config.health_url();

        let existing = match engine.inspect(&config.name).await {
            Ok(existing) => existing,
            Err(error) => {
                warn!(error = %error, "Container inspection failed");
                return (
                    PhaseOutcome::failed(Phase::ContainerStart, error.to_string()),
                    LifecycleState::NotRunning,
                );
            }
        };

        let action = match &existing {
            None => Action::Create,
            Some(_) if recreate => Action::Replace("image updated".into()),
            Some(info) => match drift(info, config, &self.ctx.assets) {
                Some(reason) => Action::Replace(reason),
                None if info.running && self.ctx.drivers.http.is_live(&url).await => {
                    info!("Container healthy, no action");
                    return (
                        PhaseOutcome::success(Phase::ContainerStart, "already healthy"),
                        LifecycleState::Healthy,
                    );
                }
                None if info.running => Action::Restart,
                None => Action::Start,
            },
        };

        info!(action = ?action, "Starting container");
        if let Err(error) = self.apply(&action).await {
            warn!(error = %error, "Container start failed");
            return (
                PhaseOutcome::failed(Phase::ContainerStart, error.to_string()),
                LifecycleState::NotRunning,
            );
        }

        match wait_ready(
            self.ctx.drivers.http.as_ref(),
            &url,
            config.health.attempts,
            config.health.interval(),
        )
        .await
        {
            Readiness::Ready { attempts } => (
                PhaseOutcome::success(
                    Phase::ContainerStart,
                    format!("{}, healthy after {attempts} probe(s)", action.describe()),
                ),
                LifecycleState::Healthy,
            ),
            Readiness::Timeout { attempts } => (
                PhaseOutcome::degraded(
                    Phase::ContainerStart,
                    format!("{}, not responding after {attempts} probe(s)", action.describe()),
                ),
                LifecycleState::Unhealthy,
            ),
        }
    }

    async fn apply(&self, action: &Action) -> Result<()> {
        let config = self.config();
        let engine = &self.ctx.drivers.containers;

        match action {
            Action::Start => {
                self.free_port().await;
                engine.start(&config.name).await
            }
            Action::Restart => {
                engine.stop(&config.name).await?;
                self.free_port().await;
                engine.start(&config.name).await
            }
            Action::Replace(reason) => {
                info!(reason = %reason, "Replacing container, data volume kept");
                if let Err(error) = engine.stop(&config.name).await {
                    warn!(error = %error, "Container stop failed");
                }
                engine.remove(&config.name).await?;
                self.create().await
            }
            Action::Create => self.create().await,
        }
    }

    async fn create(&self) -> Result<()> {
        self.free_port().await;
        let spec = container_spec(self.config(), &self.ctx.assets, self.gpus)?;
        self.ctx.drivers.containers.run(&spec).await
    }

    async fn free_port(&self) {
        let port = self.config().host_port;
        if !self.ctx.reclaimer.verify_free(port).await {
            warn!(port, "Web port still occupied, starting anyway");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Create,
    Start,
    Restart,
    Replace(String),
}

impl Action {
    fn describe(&self) -> String {
        match self {
            Self::Create => "created".into(),
            Self::Start => "started".into(),
            Self::Restart => "restarted".into(),
            Self::Replace(reason) => format!("replaced ({reason})"),
        }
    }
}
