//! Accelerator-maximized model derivations.
//!
//! Every base asset gets a sibling named `<base>-<suffix>` built from the base
//! plus the configured parameter overlay. Existing derivations are never
//! rebuilt, and one failed item never stops the others.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::health::wait_ready;
use crate::application::orchestration::context::RunContext;
use crate::domain::{DerivationResult, DerivedModelAsset, Phase, PhaseOutcome};
use crate::port::outbound::{RuntimeEnv, Signal};

/// Result for one base asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivationItem {
    pub base: String,
    pub target: String,
    pub result: DerivationResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivationReport {
    pub items: Vec<DerivationItem>,
    /// Whether a shutdown request stopped the pipeline between items.
    pub interrupted: bool,
}

impl DerivationReport {
    fn count(&self, wanted: fn(&DerivationResult) -> bool) -> usize {
        self.items.iter().filter(|item| wanted(&item.result)).count()
    }

    #[must_use]
    pub fn created(&self) -> usize {
        self.count(|result| matches!(result, DerivationResult::Created))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|result| matches!(result, DerivationResult::Skipped))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|result| matches!(result, DerivationResult::Failed(_)))
    }

    #[must_use]
    pub fn outcome(&self) -> PhaseOutcome {
        let detail = format!(
            "created {}, skipped {}, failed {}{}",
            self.created(),
            self.skipped(),
            self.failed(),
            if self.interrupted { ", interrupted" } else { "" }
        );
        if self.failed() > 0 {
            PhaseOutcome::degraded(Phase::Derivation, detail)
        } else {
            PhaseOutcome::success(Phase::Derivation, detail)
        }
    }
}

pub struct DerivationPipeline<'a> {
    ctx: &'a RunContext,
    env: &'a RuntimeEnv,
}

impl<'a> DerivationPipeline<'a> {
    /// `env` is handed to a transient runtime when the service is not answering.
    #[must_use]
    pub const fn new(ctx: &'a RunContext, env: &'a RuntimeEnv) -> Self {
        Self { ctx, env }
    }

    pub async fn run(&self) -> (PhaseOutcome, Option<DerivationReport>) {
        let transient = match self.ensure_api().await {
            Ok(transient) => transient,
            Err(reason) => return (PhaseOutcome::failed(Phase::Derivation, reason), None),
        };

        let result = self.derive_all().await;

        if let Some(pid) = transient {
            self.teardown(pid).await;
        }

        match result {
            Ok(report) => (report.outcome(), Some(report)),
            Err(reason) => (PhaseOutcome::failed(Phase::Derivation, reason), None),
        }
    }

    /// Make sure an API instance answers; returns the pid of a transient
    /// instance that must be torn down afterwards.
    async fn ensure_api(&self) -> Result<Option<u32>, String> {
        let drivers = &self.ctx.drivers;
        let url = self.ctx.runtime_probe_url();
        if drivers.http.is_live(&url).await {
            return Ok(None);
        }

        info!("Runtime not responding, spawning transient instance for derivation");
        let pid = drivers
            .runtime
            .spawn_transient(self.env)
            .await
            .map_err(|error| format!("transient runtime failed to spawn: {error}"))?;

        let health = self.ctx.config.runtime.health;
        let readiness = wait_ready(drivers.http.as_ref(), &url, health.attempts, health.interval()).await;
        if !readiness.is_ready() {
            self.teardown(pid).await;
            return Err("transient runtime never became ready".into());
        }
        Ok(Some(pid))
    }

    async fn derive_all(&self) -> Result<DerivationReport, String> {
        let config = &self.ctx.config.derivation;
        let api = &self.ctx.drivers.runtime_api;

        let models = api
            .list_models()
            .await
            .map_err(|error| format!("model listing failed: {error}"))?;
        let existing: BTreeSet<String> = models
            .iter()
            .map(|model| model.canonical_name().to_string())
            .collect();
        let overlay = config.overlay();

        let mut report = DerivationReport {
            items: Vec::new(),
            interrupted: false,
        };
        for base in models.iter().filter(|model| !model.is_derived(&config.suffix)) {
            if self.ctx.shutdown.is_requested() {
                info!("Shutdown requested, stopping derivation between items");
                report.interrupted = true;
                break;
            }

            let asset = DerivedModelAsset::for_base(base, &config.suffix, overlay.clone());
            let result = if existing.contains(&asset.name) {
                DerivationResult::Skipped
            } else {
                match api.create_derived(&asset, config.timeout()).await {
                    Ok(()) => {
                        info!(base = %asset.base, target = %asset.name, "Derivation created");
                        DerivationResult::Created
                    }
                    Err(error) => {
                        warn!(base = %asset.base, error = %error, "Derivation failed");
                        DerivationResult::Failed(error.to_string())
                    }
                }
            };
            report.items.push(DerivationItem {
                base: asset.base,
                target: asset.name,
                result,
            });
        }
        Ok(report)
    }

    async fn teardown(&self, pid: u32) {
        let processes = &self.ctx.drivers.processes;
        info!(pid, "Stopping transient runtime");
        if let Err(error) = processes.signal(pid, Signal::Terminate) {
            warn!(pid, error = %error, "SIGTERM to transient runtime failed");
        }
        tokio::time::sleep(self.ctx.config.reclaim.grace()).await;
        if processes.is_alive(pid) {
            warn!(pid, "Transient runtime survived SIGTERM, killing");
            if let Err(error) = processes.signal(pid, Signal::Kill) {
                warn!(pid, error = %error, "SIGKILL to transient runtime failed");
            }
        }
    }
}
