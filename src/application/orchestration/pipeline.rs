//! The update cycle: one strictly sequential pass over every phase.
//!
//! Cancellation is honored before the commit point (lock, asset resolution,
//! version checks) and between derivation or preload items. Once a service's
//! teardown may have begun the destructive phases always run to completion,
//! so a stopped service is never left behind.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::context::{Drivers, RunContext};
use crate::application::derivation::DerivationPipeline;
use crate::application::directory::{invoking_home, DirectoryResolver};
use crate::application::lifecycle::runtime::runtime_env;
use crate::application::lifecycle::{ContainerLifecycle, RuntimeLifecycle};
use crate::application::lock::{LockGuard, LockManager};
use crate::application::preload::preload;
use crate::application::report::{write_status_file, RunReport, StatusReporter};
use crate::application::shutdown::Shutdown;
use crate::application::version::{check_container, check_runtime};
use crate::domain::{
    AssetDirectory, ImageRef, LifecycleState, OutcomeStatus, Phase, PhaseOutcome, ServiceKind,
    VersionState,
};
use crate::error::{Error, LockError, Result};
use crate::infrastructure::config::lock::LockPolicy;
use crate::infrastructure::config::settings::Config;

/// What a completed (or cancelled) run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: RunReport,
    pub status_file: Option<PathBuf>,
}

impl RunSummary {
    #[must_use]
    pub const fn cancelled(&self) -> bool {
        self.report.cancelled
    }
}

pub struct Orchestrator {
    config: Arc<Config>,
    drivers: Drivers,
    shutdown: Shutdown,
    lock_policy: LockPolicy,
    self_pid: u32,
}

/// Mutable state threaded through one run.
#[derive(Default)]
struct Progress {
    phases: Vec<PhaseOutcome>,
    assets: Option<AssetDirectory>,
    runtime_version: Option<VersionState>,
    web_version: Option<VersionState>,
    deferred_logged: bool,
}

impl Progress {
    fn record(&mut self, outcome: PhaseOutcome) {
        match outcome.status {
            OutcomeStatus::Success | OutcomeStatus::Skipped => {
                info!(phase = %outcome.phase, status = %outcome.status, detail = %outcome.detail, "Phase finished");
            }
            OutcomeStatus::Degraded | OutcomeStatus::Failed => {
                warn!(phase = %outcome.phase, status = %outcome.status, detail = %outcome.detail, "Phase finished");
            }
        }
        self.phases.push(outcome);
    }
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, drivers: Drivers, shutdown: Shutdown) -> Self {
        let lock_policy = config.lock.on_timeout;
        Self {
            config,
            drivers,
            shutdown,
            lock_policy,
            self_pid: std::process::id(),
        }
    }

    #[must_use]
    pub const fn lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    #[must_use]
    pub const fn self_pid(mut self, pid: u32) -> Self {
        self.self_pid = pid;
        self
    }

    /// Execute the full update cycle.
    ///
    /// # Errors
    ///
    /// Only [`LockError::Contended`] under the `fail` policy; every other
    /// problem is recorded as a phase outcome.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut progress = Progress::default();
        info!(pid = self.self_pid, "Starting update cycle");

        let guard = match self.acquire_lock().await {
            Ok(guard) => {
                progress.record(lock_outcome(&guard));
                guard
            }
            Err(Error::Lock(LockError::Cancelled)) => {
                progress.record(PhaseOutcome::skipped(Phase::Lock, "cancelled while waiting"));
                return Ok(self.finish(progress, None).await);
            }
            Err(error) => return Err(error),
        };

        if self.abort_requested(Phase::ResolveAssets) {
            return Ok(self.finish(progress, Some(guard)).await);
        }
        let assets = self.resolve_assets(&mut progress);

        if self.abort_requested(Phase::RuntimeVersion) {
            return Ok(self.finish(progress, Some(guard)).await);
        }
        let runtime_version =
            check_runtime(self.drivers.runtime.as_ref(), self.drivers.releases.as_ref()).await;
        progress.record(version_outcome(Phase::RuntimeVersion, &runtime_version));
        progress.runtime_version = Some(runtime_version.clone());

        if self.abort_requested(Phase::ContainerVersion) {
            return Ok(self.finish(progress, Some(guard)).await);
        }
        let web_version = self.check_web_version(&mut progress).await;

        // Commit point: past here services may be stopped.
        if self.shutdown.is_requested() {
            info!("Shutdown requested before service changes, stopping");
            return Ok(self.finish(progress, Some(guard)).await);
        }

        let ctx = RunContext::new(
            Arc::clone(&self.config),
            self.drivers.clone(),
            assets,
            self.self_pid,
            self.shutdown.clone(),
        );
        self.converge(&ctx, &mut progress, &runtime_version, web_version.as_ref())
            .await;

        Ok(self.finish(progress, Some(guard)).await)
    }

    async fn acquire_lock(&self) -> Result<LockGuard> {
        LockManager::from_config(&self.config.lock, Arc::clone(&self.drivers.processes))
            .policy(self.lock_policy)
            .self_pid(self.self_pid)
            .acquire(&self.shutdown)
            .await
    }

    fn resolve_assets(&self, progress: &mut Progress) -> AssetDirectory {
        let home = invoking_home(self.config.invoking_user.as_deref());
        let resolver = DirectoryResolver::new(self.config.assets.clone(), home);
        let assets = match resolver.resolve() {
            Ok(assets) => {
                progress.record(PhaseOutcome::success(
                    Phase::ResolveAssets,
                    format!(
                        "{} ({} manifests, {} blobs)",
                        assets.path().display(),
                        assets.manifests(),
                        assets.blobs()
                    ),
                ));
                assets
            }
            Err(error) => {
                let assets = resolver.unverified();
                progress.record(PhaseOutcome::failed(
                    Phase::ResolveAssets,
                    format!("using {} unverified: {error}", assets.path().display()),
                ));
                assets
            }
        };
        progress.assets = Some(assets.clone());
        assets
    }

    async fn check_web_version(&self, progress: &mut Progress) -> Option<VersionState> {
        let container = &self.config.container;
        let image = match ImageRef::parse(&container.image) {
            Ok(image) => image,
            Err(error) => {
                progress.record(PhaseOutcome::failed(Phase::ContainerVersion, error.to_string()));
                return None;
            }
        };
        let state = check_container(
            self.drivers.containers.as_ref(),
            self.drivers.registry.as_ref(),
            &container.name,
            &image,
        )
        .await;
        progress.record(version_outcome(Phase::ContainerVersion, &state));
        progress.web_version = Some(state.clone());
        Some(state)
    }

    /// Everything past the commit point. Runs to completion once entered.
    async fn converge(
        &self,
        ctx: &RunContext,
        progress: &mut Progress,
        runtime_version: &VersionState,
        web_version: Option<&VersionState>,
    ) {
        let accelerator = self.drivers.accelerator.status().await;
        let runtime = RuntimeLifecycle::new(ctx);
        let web = ContainerLifecycle::new(ctx, self.config.container.gpus && accelerator.is_present());

        let runtime_due = runtime_version.needs_update(ServiceKind::Runtime);
        let web_due = web_version.is_some_and(|state| state.needs_update(ServiceKind::Container));

        if runtime_due {
            progress.record(runtime.reclaim().await);
        } else {
            progress.record(PhaseOutcome::skipped(Phase::RuntimeReclaim, "no update"));
        }
        self.note_deferred(progress);

        if web_due {
            progress.record(web.reclaim().await);
        } else {
            progress.record(PhaseOutcome::skipped(Phase::ContainerReclaim, "no update"));
        }
        self.note_deferred(progress);

        let runtime_updated = if runtime_due {
            let outcome = runtime.update().await;
            let updated = outcome.status == OutcomeStatus::Success;
            progress.record(outcome);
            updated
        } else {
            progress.record(PhaseOutcome::skipped(Phase::RuntimeUpdate, "up to date"));
            false
        };
        self.note_deferred(progress);

        let web_updated = if web_due {
            let outcome = web.update().await;
            let updated = outcome.status == OutcomeStatus::Success;
            progress.record(outcome);
            updated
        } else {
            progress.record(PhaseOutcome::skipped(Phase::ContainerUpdate, "up to date"));
            false
        };
        self.note_deferred(progress);

        let env = runtime_env(&self.config.runtime, &ctx.assets, &accelerator);
        let (outcome, env_changed) = runtime.configure(&env).await;
        progress.record(outcome);
        self.note_deferred(progress);

        if !runtime_updated {
            progress.record(PhaseOutcome::skipped(Phase::Derivation, "runtime not updated"));
        } else if self.abort_requested(Phase::Derivation) {
            progress.record(PhaseOutcome::skipped(Phase::Derivation, "cancelled"));
        } else {
            let (outcome, _) = DerivationPipeline::new(ctx, &env).run().await;
            progress.record(outcome);
        }

        let (outcome, runtime_state) = runtime.ensure_running(runtime_updated || env_changed).await;
        progress.record(outcome);
        self.note_deferred(progress);

        let (outcome, _) = web.ensure_running(web_updated).await;
        progress.record(outcome);
        self.note_deferred(progress);

        if runtime_state != LifecycleState::Healthy {
            progress.record(PhaseOutcome::skipped(Phase::Preload, "runtime not healthy"));
        } else if self.abort_requested(Phase::Preload) {
            progress.record(PhaseOutcome::skipped(Phase::Preload, "cancelled"));
        } else {
            progress.record(preload(ctx).await);
        }
    }

    /// Report, persist the status file, release the lock.
    async fn finish(&self, mut progress: Progress, guard: Option<LockGuard>) -> RunSummary {
        let cancelled = self.shutdown.is_requested();
        let report = StatusReporter::new(&self.config, &self.drivers)
            .collect("run", progress.assets.as_ref())
            .await
            .with_versions(progress.runtime_version.take(), progress.web_version.take());

        let mut status_file = None;
        let outcome = match &self.config.report.status_file {
            Some(path) => {
                // The file is written before its own phase is known.
                let draft = report.clone().with_phases(progress.phases.clone(), cancelled);
                match write_status_file(path, &draft) {
                    Ok(written) => {
                        status_file = Some(written);
                        PhaseOutcome::success(Phase::Report, format!("written to {}", path.display()))
                    }
                    Err(error) => PhaseOutcome::degraded(Phase::Report, error.to_string()),
                }
            }
            None => PhaseOutcome::success(Phase::Report, "status file disabled"),
        };
        progress.record(outcome);

        if let Some(guard) = guard {
            guard.release();
        }
        if cancelled {
            warn!("Run cancelled");
        } else {
            info!("Update cycle complete");
        }

        RunSummary {
            report: report.with_phases(progress.phases, cancelled),
            status_file,
        }
    }

    /// Whether a pending shutdown stops the run before `next`.
    fn abort_requested(&self, next: Phase) -> bool {
        if next.is_abortable() && self.shutdown.is_requested() {
            info!(phase = %next, "Shutdown requested, skipping remaining phases");
            return true;
        }
        false
    }

    fn note_deferred(&self, progress: &mut Progress) {
        if !progress.deferred_logged && self.shutdown.is_requested() {
            warn!("Shutdown requested during service changes, deferring until services are restored");
            progress.deferred_logged = true;
        }
    }
}

fn lock_outcome(guard: &LockGuard) -> PhaseOutcome {
    if let Some(reason) = guard.unavailable_reason() {
        return PhaseOutcome::degraded(Phase::Lock, format!("proceeding unlocked: {reason}"));
    }
    match guard.displaced() {
        Some(pid) => PhaseOutcome::degraded(
            Phase::Lock,
            format!("held at {}, displaced pid {pid}", guard.path().display()),
        ),
        None => PhaseOutcome::success(Phase::Lock, format!("held at {}", guard.path().display())),
    }
}

fn version_outcome(phase: Phase, state: &VersionState) -> PhaseOutcome {
    let current = state.current.as_deref().unwrap_or("none");
    let latest = state.latest.known().unwrap_or("unknown");
    PhaseOutcome::success(phase, format!("{current} / {latest}: {}", state.decision))
}
