//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! Each external system is reached through a narrow trait with typed
//! results, so the application layer never parses command output.

pub mod accelerator;
pub mod container;
pub mod feed;
pub mod probe;
pub mod process;
pub mod runtime;

pub use accelerator::{Accelerator, AcceleratorDevice, AcceleratorStatus};
pub use container::{ContainerEngine, ContainerInfo, ContainerSpec, Mount};
pub use feed::{ImageRegistry, ReleaseFeed};
pub use probe::{HttpProbe, PortProbe};
pub use process::{ProcessTable, Signal};
pub use runtime::{RuntimeApi, RuntimeEnv, RuntimeService};
