//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`host`] - In-memory process table and port owners.
//! - [`probe`] - Scripted HTTP liveness answers.
//! - [`stack`] - A simulated runtime, container engine and release sources.
//! - [`config`] - Canonical fast test configurations.

pub mod config;
pub mod host;
pub mod probe;
pub mod stack;
