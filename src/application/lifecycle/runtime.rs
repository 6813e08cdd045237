//! Native runtime lifecycle: reclaim, update, configure, ensure-running.

use tracing::{info, warn};

use crate::application::health::{wait_ready, Readiness};
use crate::application::orchestration::context::RunContext;
use crate::domain::{AssetDirectory, LifecycleState, Phase, PhaseOutcome};
use crate::infrastructure::config::runtime::RuntimeConfig;
use crate::port::outbound::{AcceleratorStatus, RuntimeEnv};

/// Environment injected into every runtime instance.
#[must_use]
pub fn runtime_env(
    config: &RuntimeConfig,
    assets: &AssetDirectory,
    accelerator: &AcceleratorStatus,
) -> RuntimeEnv {
    let mut env = RuntimeEnv::new()
        .with("OLLAMA_MODELS", assets.display_path())
        .with("OLLAMA_HOST", format!("{}:{}", config.bind_host, config.port))
        .with("OLLAMA_NUM_PARALLEL", config.num_parallel.to_string())
        .with(
            "OLLAMA_MAX_LOADED_MODELS",
            config.max_loaded_models.to_string(),
        )
        .with(
            "OLLAMA_FLASH_ATTENTION",
            if config.flash_attention { "1" } else { "0" },
        )
        .with("OLLAMA_KEEP_ALIVE", config.keep_alive.clone());

    if let AcceleratorStatus::Present { devices, .. } = accelerator {
        let visible: Vec<String> = (0..devices.len()).map(|index| index.to_string()).collect();
        env = env.with("CUDA_VISIBLE_DEVICES", visible.join(","));
    }

    for (key, value) in &config.extra_env {
        env = env.with(key.clone(), value.clone());
    }
    env
}

pub struct RuntimeLifecycle<'a> {
    ctx: &'a RunContext,
}

impl<'a> RuntimeLifecycle<'a> {
    #[must_use]
    pub const fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    fn config(&self) -> &RuntimeConfig {
        &self.ctx.config.runtime
    }

    /// Stop the unit and clear stray processes and the API port.
    pub async fn reclaim(&self) -> PhaseOutcome {
        let config = self.config();
        if let Err(error) = self.ctx.drivers.runtime.stop().await {
            warn!(error = %error, "Runtime stop failed, reclaiming anyway");
        }
        let killed = self
            .ctx
            .reclaimer
            .reclaim_processes(&config.process_pattern)
            .await;
        self.ctx.reclaimer.reclaim_port(config.port).await;

        PhaseOutcome::success(
            Phase::RuntimeReclaim,
            format!("service stopped, {killed} stray process(es), port {} reclaimed", config.port),
        )
    }

    /// Run the opaque install/upgrade action.
    pub async fn update(&self) -> PhaseOutcome {
        match self.ctx.drivers.runtime.install().await {
            Ok(()) => {
                let version = self
                    .ctx
                    .drivers
                    .runtime
                    .installed_version()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "unknown".into());
                PhaseOutcome::success(Phase::RuntimeUpdate, format!("installed {version}"))
            }
            Err(error) => {
                warn!(error = %error, "Runtime install failed");
                PhaseOutcome::failed(Phase::RuntimeUpdate, error.to_string())
            }
        }
    }

    /// Persist `env` as the service override.
    ///
    /// Returns the outcome and whether the override changed.
    pub async fn configure(&self, env: &RuntimeEnv) -> (PhaseOutcome, bool) {
        match self.ctx.drivers.runtime.apply_environment(env).await {
            Ok(true) => (
                PhaseOutcome::success(Phase::RuntimeConfigure, "override updated"),
                true,
            ),
            Ok(false) => (
                PhaseOutcome::success(Phase::RuntimeConfigure, "override unchanged"),
                false,
            ),
            Err(error) => {
                warn!(error = %error, "Runtime override could not be applied");
                (
                    PhaseOutcome::degraded(Phase::RuntimeConfigure, error.to_string()),
                    false,
                )
            }
        }
    }

    /// Make sure the runtime is up and answering.
    ///
    /// With `restart` the service is cycled regardless of its current health;
    /// otherwise a healthy runtime is left untouched.
    pub async fn ensure_running(&self, restart: bool) -> (PhaseOutcome, LifecycleState) {
        let drivers = &self.ctx.drivers;
        let config = self.config();
        let url = self.ctx.runtime_probe_url();

        if !restart && drivers.http.is_live(&url).await {
            info!("Runtime healthy, no action");
            return (
                PhaseOutcome::success(Phase::RuntimeStart, "already healthy"),
                LifecycleState::Healthy,
            );
        }

        info!(restart, "Starting runtime");
        if restart {
            if let Err(error) = drivers.runtime.stop().await {
                warn!(error = %error, "Runtime stop before restart failed");
            }
        }
        if !self.ctx.reclaimer.verify_free(config.port).await {
            warn!(port = config.port, "Runtime port still occupied, starting anyway");
        }

        if let Err(error) = drivers.runtime.start().await {
            warn!(error = %error, "Runtime start failed");
            return (
                PhaseOutcome::failed(Phase::RuntimeStart, error.to_string()),
                LifecycleState::NotRunning,
            );
        }

        match wait_ready(
            drivers.http.as_ref(),
            &url,
            config.health.attempts,
            config.health.interval(),
        )
        .await
        {
            Readiness::Ready { attempts } => (
                PhaseOutcome::success(
                    Phase::RuntimeStart,
                    format!("healthy after {attempts} probe(s)"),
                ),
                LifecycleState::Healthy,
            ),
            Readiness::Timeout { attempts } => (
                PhaseOutcome::degraded(
                    Phase::RuntimeStart,
                    format!("not responding after {attempts} probe(s)"),
                ),
                LifecycleState::Unhealthy,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::DirectoryOrigin;
    use crate::port::outbound::AcceleratorDevice;

    fn assets() -> AssetDirectory {
        AssetDirectory::new(
            PathBuf::from("/srv/models"),
            0,
            0,
            DirectoryOrigin::Candidate(0),
        )
    }

    #[test]
    fn env_carries_runtime_parameters() {
        let env = runtime_env(&RuntimeConfig::default(), &assets(), &AcceleratorStatus::Absent);

        assert_eq!(env.get("OLLAMA_MODELS"), Some("/srv/models"));
        assert_eq!(env.get("OLLAMA_HOST"), Some("0.0.0.0:11434"));
        assert_eq!(env.get("OLLAMA_NUM_PARALLEL"), Some("4"));
        assert_eq!(env.get("OLLAMA_MAX_LOADED_MODELS"), Some("2"));
        assert_eq!(env.get("OLLAMA_FLASH_ATTENTION"), Some("1"));
        assert_eq!(env.get("OLLAMA_KEEP_ALIVE"), Some("24h"));
        assert_eq!(env.get("CUDA_VISIBLE_DEVICES"), None);
    }

    #[test]
    fn accelerator_devices_become_visible() {
        let device = AcceleratorDevice {
            name: "gpu".into(),
            memory_total_mib: 1,
            memory_used_mib: 0,
        };
        let status = AcceleratorStatus::Present {
            driver: None,
            devices: vec![device.clone(), device],
        };
        let env = runtime_env(&RuntimeConfig::default(), &assets(), &status);
        assert_eq!(env.get("CUDA_VISIBLE_DEVICES"), Some("0,1"));
    }

    #[test]
    fn extra_env_overrides_defaults() {
        let mut config = RuntimeConfig::default();
        config
            .extra_env
            .insert("OLLAMA_KEEP_ALIVE".into(), "-1".into());
        config.extra_env.insert("OLLAMA_DEBUG".into(), "1".into());

        let env = runtime_env(&config, &assets(), &AcceleratorStatus::Absent);
        assert_eq!(env.get("OLLAMA_KEEP_ALIVE"), Some("-1"));
        assert_eq!(env.get("OLLAMA_DEBUG"), Some("1"));
    }
}
