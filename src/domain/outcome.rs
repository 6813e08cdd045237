//! Structured phase outcomes aggregated into the run report.

use std::fmt;

use serde::Serialize;

/// Pipeline phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lock,
    ResolveAssets,
    RuntimeVersion,
    ContainerVersion,
    RuntimeReclaim,
    ContainerReclaim,
    RuntimeUpdate,
    ContainerUpdate,
    RuntimeConfigure,
    Derivation,
    RuntimeStart,
    ContainerStart,
    Preload,
    Report,
}

impl Phase {
    /// Whether a pending cancellation may stop the run before this phase.
    ///
    /// Reclaim, update, configure and start phases are never interrupted once
    /// a service's teardown has begun.
    #[must_use]
    pub const fn is_abortable(self) -> bool {
        matches!(
            self,
            Self::Lock
                | Self::ResolveAssets
                | Self::RuntimeVersion
                | Self::ContainerVersion
                | Self::Derivation
                | Self::Preload
        )
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::ResolveAssets => "resolve assets",
            Self::RuntimeVersion => "runtime version",
            Self::ContainerVersion => "web version",
            Self::RuntimeReclaim => "runtime reclaim",
            Self::ContainerReclaim => "web reclaim",
            Self::RuntimeUpdate => "runtime update",
            Self::ContainerUpdate => "web update",
            Self::RuntimeConfigure => "runtime configure",
            Self::Derivation => "derivation",
            Self::RuntimeStart => "runtime start",
            Self::ContainerStart => "web start",
            Self::Preload => "preload",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Skipped,
    Degraded,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "ok",
            Self::Skipped => "skipped",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub status: OutcomeStatus,
    pub detail: String,
}

impl PhaseOutcome {
    pub fn success(phase: Phase, detail: impl Into<String>) -> Self {
        Self::new(phase, OutcomeStatus::Success, detail)
    }

    pub fn skipped(phase: Phase, detail: impl Into<String>) -> Self {
        Self::new(phase, OutcomeStatus::Skipped, detail)
    }

    pub fn degraded(phase: Phase, detail: impl Into<String>) -> Self {
        Self::new(phase, OutcomeStatus::Degraded, detail)
    }

    pub fn failed(phase: Phase, detail: impl Into<String>) -> Self {
        Self::new(phase, OutcomeStatus::Failed, detail)
    }

    fn new(phase: Phase, status: OutcomeStatus, detail: impl Into<String>) -> Self {
        Self {
            phase,
            status,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success | OutcomeStatus::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destructive_phases_are_not_abortable() {
        for phase in [
            Phase::RuntimeReclaim,
            Phase::ContainerReclaim,
            Phase::RuntimeUpdate,
            Phase::ContainerUpdate,
            Phase::RuntimeConfigure,
            Phase::RuntimeStart,
            Phase::ContainerStart,
        ] {
            assert!(!phase.is_abortable(), "{phase} must run to completion");
        }
        assert!(Phase::ResolveAssets.is_abortable());
    }

    #[test]
    fn degraded_and_failed_are_not_clean() {
        assert!(PhaseOutcome::skipped(Phase::Derivation, "").is_clean());
        assert!(!PhaseOutcome::degraded(Phase::RuntimeStart, "timeout").is_clean());
        assert!(!PhaseOutcome::failed(Phase::Lock, "io").is_clean());
    }
}
