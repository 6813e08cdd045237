//! Managed service kinds and their observed states.

use std::fmt;

use serde::Serialize;

/// The two co-dependent services under management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Native inference runtime managed through systemd.
    Runtime,
    /// Web front-end running as a container.
    Container,
}

impl ServiceKind {
    /// How an undetermined version comparison is resolved.
    ///
    /// The runtime favors freshness (reinstalls are cheap and assets live
    /// outside it); the container favors stability (a needless teardown
    /// disrupts users).
    #[must_use]
    pub const fn undetermined_means_update(self) -> bool {
        matches!(self, Self::Runtime)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Container => "web",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Observed state, always combining process/container presence with an HTTP check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Absent,
    Stopped,
    RunningResponding,
    RunningNotResponding,
}

impl ServiceState {
    /// Derive the state from presence flags and a liveness answer.
    #[must_use]
    pub const fn observe(present: bool, running: bool, responding: bool) -> Self {
        match (present, running, responding) {
            (_, _, true) => Self::RunningResponding,
            (false, _, false) => Self::Absent,
            (true, false, false) => Self::Stopped,
            (true, true, false) => Self::RunningNotResponding,
        }
    }

    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::RunningResponding)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Absent => "absent",
            Self::Stopped => "stopped",
            Self::RunningResponding => "running",
            Self::RunningNotResponding => "running, not responding",
        };
        f.write_str(label)
    }
}

/// Lifecycle state machine position for one service during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    NotRunning,
    Starting,
    Healthy,
    Unhealthy,
}

impl From<ServiceState> for LifecycleState {
    fn from(state: ServiceState) -> Self {
        match state {
            ServiceState::RunningResponding => Self::Healthy,
            ServiceState::RunningNotResponding => Self::Unhealthy,
            ServiceState::Absent | ServiceState::Stopped => Self::NotRunning,
        }
    }
}
