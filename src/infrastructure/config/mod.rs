//! Infrastructure configuration modules.

pub mod assets;
pub mod container;
pub mod lock;
pub mod logging;
pub mod runtime;
pub mod service;
pub mod settings;
