//! Process table and socket ownership port.

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful termination request.
    Terminate,
    /// Forceful kill.
    Kill,
}

/// Host process table access.
///
/// The three port-owner lookups mirror independent kernel views so that a
/// listener missed by one is still caught by another.
#[async_trait]
pub trait ProcessTable: Send + Sync {
    /// Whether `pid` refers to an existing process.
    fn is_alive(&self, pid: u32) -> bool;

    /// Pids whose command line contains `pattern`.
    fn find(&self, pattern: &str) -> Vec<u32>;

    fn signal(&self, pid: u32, signal: Signal) -> Result<()>;

    /// Signal-based termination of whatever owns `port`.
    async fn kill_port_owner(&self, port: u16) -> Result<()>;

    /// Owners of `port` according to the open-connection table.
    async fn connection_owners(&self, port: u16) -> Result<Vec<u32>>;

    /// Owners of `port` according to the socket statistics table.
    async fn socket_owners(&self, port: u16) -> Result<Vec<u32>>;
}
