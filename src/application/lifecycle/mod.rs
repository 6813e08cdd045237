//! Per-service lifecycle managers.
//!
//! Both managers follow the same shape: an update path (reclaim, install or
//! pull, start, probe) and a steady-state path that only acts when the
//! service is absent, unhealthy or has drifted from the resolved settings.

pub mod container;
pub mod runtime;

pub use container::ContainerLifecycle;
pub use runtime::RuntimeLifecycle;
