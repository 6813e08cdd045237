//! Container engine and image registry adapters.

pub mod engine;
pub mod registry;

pub use engine::DockerCli;
pub use registry::HttpRegistry;
