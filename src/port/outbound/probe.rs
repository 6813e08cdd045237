//! Liveness probing ports.

use async_trait::async_trait;

/// HTTP liveness check.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// `true` when `url` answers with a success status.
    async fn is_live(&self, url: &str) -> bool;
}

/// Loopback TCP occupancy check.
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// `true` when something accepts connections on `127.0.0.1:port`.
    async fn is_occupied(&self, port: u16) -> bool;
}
