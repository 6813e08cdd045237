//! Host-level adapters: process table and liveness probes.

pub mod probe;
pub mod process;

pub use probe::{ReqwestProbe, TcpPortProbe};
pub use process::HostProcessTable;
