use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use stackwarden::application::orchestration::{Orchestrator, RunContext};
use stackwarden::application::shutdown::Shutdown;
use stackwarden::domain::AssetDirectory;
use stackwarden::infrastructure::config::settings::Config;
use stackwarden::testkit;
use stackwarden::testkit::stack::{assets_at, MockStack};
use tempfile::TempDir;

/// A temporary root with a fast configuration pointing into it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = testkit::config::stack(dir.path());
        Self { dir, config }
    }

    pub fn models_dir(&self) -> PathBuf {
        self.dir.path().join("models")
    }

    /// Populate the asset directory so it counts as valid.
    pub fn populated_assets(&self) -> AssetDirectory {
        let manifests = self.models_dir().join("manifests");
        fs::create_dir_all(&manifests).expect("create manifests");
        fs::write(manifests.join("modelA"), "{}").expect("write manifest");
        assets_at(&self.models_dir())
    }

    pub fn orchestrator(&self, stack: &MockStack) -> Orchestrator {
        self.orchestrator_with(stack, Shutdown::never())
    }

    pub fn orchestrator_with(&self, stack: &MockStack, shutdown: Shutdown) -> Orchestrator {
        Orchestrator::new(Arc::new(self.config.clone()), stack.drivers(), shutdown).self_pid(1)
    }

    pub fn context(&self, stack: &MockStack, assets: AssetDirectory) -> RunContext {
        self.context_with(stack, assets, Shutdown::never())
    }

    pub fn context_with(&self, stack: &MockStack, assets: AssetDirectory, shutdown: Shutdown) -> RunContext {
        RunContext::new(Arc::new(self.config.clone()), stack.drivers(), assets, 1, shutdown)
    }
}

/// A shutdown signal that has already been raised.
pub fn cancelled() -> Shutdown {
    let (_tx, rx) = tokio::sync::watch::channel(true);
    Shutdown::new(rx)
}
