//! Application services (use cases).
//!
//! These services orchestrate domain logic and coordinate the outbound ports
//! to implement one update cycle.

pub mod derivation;
pub mod directory;
pub mod health;
pub mod lifecycle;
pub mod lock;
pub mod orchestration;
pub mod preload;
pub mod reclaim;
pub mod report;
pub mod shutdown;
pub mod version;
