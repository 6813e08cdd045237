//! Outbound adapters (driven side).

pub(crate) mod exec;

pub mod docker;
pub mod github;
pub mod host;
pub mod nvidia;
pub mod ollama;
