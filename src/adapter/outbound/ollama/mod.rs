//! Native inference runtime adapters.
//!
//! - [`service`] - systemd unit, installer and drop-in override
//! - [`api`] - the runtime's local HTTP API

pub mod api;
pub mod service;

pub use api::OllamaApi;
pub use service::SystemdRuntime;
