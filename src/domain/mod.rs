//! Stack-agnostic types: versions, assets, service states, outcomes.

pub mod asset;
pub mod image;
pub mod lock;
pub mod outcome;
pub mod service;
pub mod version;

pub use asset::{
    AssetDirectory, DerivationResult, DerivedModelAsset, DirectoryOrigin, ModelAsset, Overlay,
};
pub use image::ImageRef;
pub use lock::LockRecord;
pub use outcome::{OutcomeStatus, Phase, PhaseOutcome};
pub use service::{LifecycleState, ServiceKind, ServiceState};
pub use version::{Decision, Deployed, Latest, VersionState};
