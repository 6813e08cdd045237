//! Warm-up requests that load configured models into memory.

use tracing::{info, warn};

use crate::application::orchestration::context::RunContext;
use crate::domain::{Phase, PhaseOutcome};

/// Preload each configured model; stops early on shutdown.
pub async fn preload(ctx: &RunContext) -> PhaseOutcome {
    let runtime = &ctx.config.runtime;
    if runtime.preload.is_empty() {
        return PhaseOutcome::skipped(Phase::Preload, "no models configured");
    }

    let mut loaded = 0usize;
    let mut failed = Vec::new();
    for model in &runtime.preload {
        if ctx.shutdown.is_requested() {
            info!("Shutdown requested, stopping preload");
            break;
        }
        match ctx.drivers.runtime_api.preload(model, &runtime.keep_alive).await {
            Ok(()) => {
                info!(model = %model, "Model preloaded");
                loaded += 1;
            }
            Err(error) => {
                warn!(model = %model, error = %error, "Preload failed");
                failed.push(model.as_str());
            }
        }
    }

    if failed.is_empty() {
        PhaseOutcome::success(Phase::Preload, format!("{loaded} model(s) loaded"))
    } else {
        PhaseOutcome::degraded(
            Phase::Preload,
            format!("{loaded} loaded, failed: {}", failed.join(", ")),
        )
    }
}
