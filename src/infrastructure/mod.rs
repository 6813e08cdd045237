//! Infrastructure: configuration loading and adapter wiring.

pub mod bootstrap;
pub mod config;
