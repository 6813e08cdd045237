//! Immutable per-run context shared by every phase.

use std::sync::Arc;

use crate::application::reclaim::Reclaimer;
use crate::application::shutdown::Shutdown;
use crate::domain::AssetDirectory;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::{
    Accelerator, ContainerEngine, HttpProbe, ImageRegistry, PortProbe, ProcessTable, ReleaseFeed,
    RuntimeApi, RuntimeService,
};

/// Every external collaborator, behind its port.
#[derive(Clone)]
pub struct Drivers {
    pub runtime: Arc<dyn RuntimeService>,
    pub runtime_api: Arc<dyn RuntimeApi>,
    pub containers: Arc<dyn ContainerEngine>,
    pub releases: Arc<dyn ReleaseFeed>,
    pub registry: Arc<dyn ImageRegistry>,
    pub processes: Arc<dyn ProcessTable>,
    pub ports: Arc<dyn PortProbe>,
    pub http: Arc<dyn HttpProbe>,
    pub accelerator: Arc<dyn Accelerator>,
}

/// Built once the asset directory is known; never mutated afterwards.
pub struct RunContext {
    pub config: Arc<Config>,
    pub drivers: Drivers,
    pub assets: AssetDirectory,
    pub self_pid: u32,
    pub shutdown: Shutdown,
    pub reclaimer: Reclaimer,
}

impl RunContext {
    pub fn new(
        config: Arc<Config>,
        drivers: Drivers,
        assets: AssetDirectory,
        self_pid: u32,
        shutdown: Shutdown,
    ) -> Self {
        let reclaimer = Reclaimer::new(
            Arc::clone(&drivers.processes),
            Arc::clone(&drivers.ports),
            config.reclaim.clone(),
            self_pid,
        );
        Self {
            config,
            drivers,
            assets,
            self_pid,
            shutdown,
            reclaimer,
        }
    }

    /// Loopback URL probed for runtime liveness.
    #[must_use]
    pub fn runtime_probe_url(&self) -> String {
        format!("{}/", self.config.runtime.api_url())
    }
}
