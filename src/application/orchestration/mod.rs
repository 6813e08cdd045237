//! Run orchestration: the per-run context and the phase pipeline.

pub mod context;
pub mod pipeline;

pub use context::{Drivers, RunContext};
pub use pipeline::{Orchestrator, RunSummary};
