//! Stackwarden - update and lifecycle orchestration for a local inference stack.
//!
//! One run keeps two co-dependent services current and healthy: a native
//! inference runtime managed through systemd, and a web front-end running as
//! a container. Both share a single on-disk model asset directory.
//!
//! # Architecture
//!
//! - [`domain`] - Stack-agnostic types: versions, assets, service states, outcomes
//! - [`port`] - Driver traits for every external system
//! - [`adapter`] - CLI plus the systemd, docker, HTTP and host adapters
//! - [`application`] - Lock, asset resolution, lifecycle managers, derivation
//!   and the phase pipeline
//! - [`infrastructure`] - Configuration loading and adapter wiring
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stackwarden::application::orchestration::Orchestrator;
//! use stackwarden::application::shutdown::Shutdown;
//! use stackwarden::infrastructure::bootstrap::build_drivers;
//! use stackwarden::infrastructure::config::settings::Config;
//!
//! # async fn example() -> stackwarden::error::Result<()> {
//! let config = Config::load_or_default("/etc/stackwarden/config.toml")?;
//! let drivers = build_drivers(&config)?;
//! let summary = Orchestrator::new(Arc::new(config), drivers, Shutdown::never())
//!     .run()
//!     .await?;
//! println!("healthy: {}", summary.report.is_healthy());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
