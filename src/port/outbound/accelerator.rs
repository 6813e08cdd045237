//! Accelerator status port. Queried, never controlled.

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceleratorDevice {
    pub name: String,
    pub memory_total_mib: u64,
    pub memory_used_mib: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AcceleratorStatus {
    Present {
        driver: Option<String>,
        devices: Vec<AcceleratorDevice>,
    },
    Absent,
}

impl AcceleratorStatus {
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

#[async_trait]
pub trait Accelerator: Send + Sync {
    async fn status(&self) -> AcceleratorStatus;
}
