//! A whole simulated stack behind every driver port.
//!
//! [`MockStack`] keeps one shared state for the runtime service, its API, the
//! container engine, both release sources and the accelerator. HTTP liveness
//! follows that state, so a stopped service stops answering. Every call that
//! changes something is appended to a journal for idempotence assertions.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::host::MockHost;
use crate::application::lifecycle::container::container_spec;
use crate::application::orchestration::context::Drivers;
use crate::domain::{AssetDirectory, DerivedModelAsset, DirectoryOrigin, ImageRef, ModelAsset};
use crate::error::{Error, Result};
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::{
    Accelerator, AcceleratorDevice, AcceleratorStatus, ContainerEngine, ContainerInfo,
    ContainerSpec, HttpProbe, ImageRegistry, Mount, ReleaseFeed, RuntimeApi, RuntimeEnv,
    RuntimeService,
};

/// Pid handed out for transient runtime instances.
pub const TRANSIENT_PID: u32 = 4242;

#[derive(Debug, Default)]
struct StackState {
    installed: Option<String>,
    latest: Option<String>,
    install_fails: bool,
    runtime_active: bool,
    runtime_answers: bool,
    override_env: Option<RuntimeEnv>,

    models: Vec<String>,
    failing_bases: BTreeSet<String>,
    list_fails: bool,
    preload_fails: BTreeSet<String>,
    preloaded: Vec<String>,

    container: Option<ContainerInfo>,
    container_answers: bool,
    remote_digest: Option<String>,
    local_digest: Option<String>,
    pull_fails: bool,

    accelerator: Option<AcceleratorStatus>,
    journal: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MockStack {
    state: Arc<Mutex<StackState>>,
    host: MockHost,
    runtime_probe: String,
    web_probe: String,
}

impl MockStack {
    /// An empty host: nothing installed, nothing running, feeds unreachable.
    pub fn new(config: &Config) -> Self {
        Self {
            state: Arc::new(Mutex::new(StackState {
                runtime_answers: true,
                container_answers: true,
                ..StackState::default()
            })),
            host: MockHost::new(),
            runtime_probe: format!("{}/", config.runtime.api_url()),
            web_probe: config.container.health_url(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StackState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record(&self, entry: impl Into<String>) {
        self.lock().journal.push(entry.into());
    }

    /// Installed and running at `version`, with `latest` published.
    pub fn with_runtime(self, version: &str, latest: &str) -> Self {
        {
            let mut state = self.lock();
            state.installed = Some(version.into());
            state.latest = Some(latest.into());
            state.runtime_active = true;
        }
        self
    }

    /// Nothing installed yet; the feed publishes `latest`.
    pub fn with_latest(self, latest: &str) -> Self {
        self.lock().latest = Some(latest.into());
        self
    }

    /// Runtime is active but never answers HTTP.
    pub fn with_unresponsive_runtime(self) -> Self {
        self.lock().runtime_answers = false;
        self
    }

    pub fn with_runtime_stopped(self) -> Self {
        self.lock().runtime_active = false;
        self
    }

    pub fn with_failing_install(self) -> Self {
        self.lock().install_fails = true;
        self
    }

    pub fn with_models(self, models: &[&str]) -> Self {
        self.lock().models = models.iter().map(ToString::to_string).collect();
        self
    }

    /// Derivations from `base` fail.
    pub fn with_failing_base(self, base: &str) -> Self {
        self.lock().failing_bases.insert(base.into());
        self
    }

    pub fn with_failing_listing(self) -> Self {
        self.lock().list_fails = true;
        self
    }

    pub fn with_failing_preload(self, model: &str) -> Self {
        self.lock().preload_fails.insert(model.into());
        self
    }

    /// Registry publishes `digest`.
    pub fn with_remote_digest(self, digest: &str) -> Self {
        self.lock().remote_digest = Some(digest.into());
        self
    }

    pub fn with_local_digest(self, digest: &str) -> Self {
        self.lock().local_digest = Some(digest.into());
        self
    }

    pub fn with_failing_pull(self) -> Self {
        self.lock().pull_fails = true;
        self
    }

    /// A container created exactly as a run would create it for `assets`.
    pub fn with_container(self, config: &Config, assets: &AssetDirectory, digest: &str, running: bool) -> Self {
        let info = container_spec(&config.container, assets, false)
            .map(|spec| info_from_spec(&spec, Some(digest.to_string()), running))
            .ok();
        self.lock().container = info;
        self
    }

    /// Replace the container's asset mount source (drift).
    pub fn with_container_mount(self, destination: &str, source: &str) -> Self {
        if let Some(info) = self.lock().container.as_mut() {
            for mount in &mut info.mounts {
                if mount.destination == destination {
                    mount.source = source.into();
                }
            }
        }
        self
    }

    pub fn with_unresponsive_container(self) -> Self {
        self.lock().container_answers = false;
        self
    }

    pub fn with_accelerator(self, devices: usize) -> Self {
        let device = AcceleratorDevice {
            name: "Mock GPU".into(),
            memory_total_mib: 24_576,
            memory_used_mib: 0,
        };
        self.lock().accelerator = Some(AcceleratorStatus::Present {
            driver: Some("550.00".into()),
            devices: vec![device; devices],
        });
        self
    }

    pub fn with_host(mut self, host: MockHost) -> Self {
        self.host = host;
        self
    }

    pub fn host(&self) -> &MockHost {
        &self.host
    }

    /// Every state-changing driver call, in order.
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    pub fn models(&self) -> Vec<String> {
        self.lock().models.clone()
    }

    pub fn preloaded(&self) -> Vec<String> {
        self.lock().preloaded.clone()
    }

    pub fn container(&self) -> Option<ContainerInfo> {
        self.lock().container.clone()
    }

    pub fn installed(&self) -> Option<String> {
        self.lock().installed.clone()
    }

    pub fn override_env(&self) -> Option<RuntimeEnv> {
        self.lock().override_env.clone()
    }

    /// Mock drivers sharing this stack's state.
    pub fn drivers(&self) -> Drivers {
        let this = Arc::new(self.clone());
        Drivers {
            runtime: this.clone(),
            runtime_api: this.clone(),
            containers: this.clone(),
            releases: this.clone(),
            registry: this.clone(),
            processes: self.host.processes(),
            ports: self.host.ports(),
            http: this.clone(),
            accelerator: this,
        }
    }
}

/// An asset directory value for fixtures.
pub fn assets_at(path: &std::path::Path) -> AssetDirectory {
    AssetDirectory::new(path.to_path_buf(), 0, 0, DirectoryOrigin::Created)
}

fn info_from_spec(spec: &ContainerSpec, digest: Option<String>, running: bool) -> ContainerInfo {
    ContainerInfo {
        id: format!("{}-id", spec.name),
        image: spec.image.to_string(),
        image_digest: digest,
        running,
        mounts: spec
            .volumes
            .iter()
            .map(|(source, destination)| Mount {
                source: source.clone(),
                destination: destination.clone(),
            })
            .collect(),
        env: spec.env.clone(),
    }
}

fn missing(driver: &'static str) -> Error {
    Error::driver(driver, "unavailable")
}

#[async_trait]
impl RuntimeService for MockStack {
    async fn installed_version(&self) -> Result<Option<String>> {
        Ok(self.lock().installed.clone())
    }

    async fn install(&self) -> Result<()> {
        self.record("runtime.install");
        let mut state = self.lock();
        if state.install_fails {
            return Err(Error::driver("installer", "exit status 1"));
        }
        state.installed = state.latest.clone().or_else(|| Some("0.0.1".into()));
        Ok(())
    }

    async fn is_active(&self) -> Result<bool> {
        Ok(self.lock().runtime_active)
    }

    async fn start(&self) -> Result<()> {
        self.record("runtime.start");
        self.lock().runtime_active = true;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("runtime.stop");
        self.lock().runtime_active = false;
        Ok(())
    }

    async fn apply_environment(&self, env: &RuntimeEnv) -> Result<bool> {
        let mut state = self.lock();
        if state.override_env.as_ref() == Some(env) {
            return Ok(false);
        }
        state.override_env = Some(env.clone());
        state.journal.push("runtime.override".into());
        Ok(true)
    }

    async fn spawn_transient(&self, _env: &RuntimeEnv) -> Result<u32> {
        self.record("runtime.spawn_transient");
        self.host.add_process(TRANSIENT_PID, "ollama serve");
        Ok(TRANSIENT_PID)
    }
}

#[async_trait]
impl RuntimeApi for MockStack {
    async fn version(&self) -> Result<String> {
        self.lock().installed.clone().ok_or_else(|| missing("runtime api"))
    }

    async fn list_models(&self) -> Result<Vec<ModelAsset>> {
        let state = self.lock();
        if state.list_fails {
            return Err(missing("runtime api"));
        }
        Ok(state.models.iter().map(ModelAsset::new).collect())
    }

    async fn create_derived(&self, asset: &DerivedModelAsset, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.journal.push(format!("api.create:{}", asset.name));
        if state.failing_bases.contains(&asset.base) {
            return Err(Error::driver("runtime api", format!("cannot derive {}", asset.base)));
        }
        state.models.push(asset.name.clone());
        Ok(())
    }

    async fn preload(&self, model: &str, _keep_alive: &str) -> Result<()> {
        let mut state = self.lock();
        if state.preload_fails.contains(model) {
            return Err(Error::driver("runtime api", format!("model {model} not found")));
        }
        state.preloaded.push(model.to_string());
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for MockStack {
    async fn inspect(&self, _name: &str) -> Result<Option<ContainerInfo>> {
        Ok(self.lock().container.clone())
    }

    async fn local_image_digest(&self, _image: &ImageRef) -> Result<Option<String>> {
        Ok(self.lock().local_digest.clone())
    }

    async fn pull(&self, _image: &ImageRef) -> Result<()> {
        self.record("container.pull");
        let mut state = self.lock();
        if state.pull_fails {
            return Err(Error::driver("docker", "pull failed"));
        }
        state.local_digest = state.remote_digest.clone();
        Ok(())
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<()> {
        self.record("container.run");
        let mut state = self.lock();
        if state.container.is_some() {
            return Err(Error::driver("docker", "container name already in use"));
        }
        let digest = state.local_digest.clone().or_else(|| state.remote_digest.clone());
        state.container = Some(info_from_spec(spec, digest, true));
        Ok(())
    }

    async fn start(&self, _name: &str) -> Result<()> {
        self.record("container.start");
        match self.lock().container.as_mut() {
            Some(info) => {
                info.running = true;
                Ok(())
            }
            None => Err(Error::driver("docker", "no such container")),
        }
    }

    async fn stop(&self, _name: &str) -> Result<()> {
        self.record("container.stop");
        if let Some(info) = self.lock().container.as_mut() {
            info.running = false;
        }
        Ok(())
    }

    async fn remove(&self, _name: &str) -> Result<()> {
        self.record("container.rm");
        self.lock().container = None;
        Ok(())
    }
}

#[async_trait]
impl ReleaseFeed for MockStack {
    async fn latest_version(&self) -> Result<String> {
        self.lock().latest.clone().ok_or_else(|| missing("release feed"))
    }
}

#[async_trait]
impl ImageRegistry for MockStack {
    async fn remote_digest(&self, _image: &ImageRef) -> Result<String> {
        self.lock()
            .remote_digest
            .clone()
            .ok_or_else(|| missing("registry"))
    }
}

#[async_trait]
impl HttpProbe for MockStack {
    async fn is_live(&self, url: &str) -> bool {
        let state = self.lock();
        if url == self.runtime_probe {
            let service = state.runtime_active && state.runtime_answers;
            return service || self.host.is_alive(TRANSIENT_PID);
        }
        if url == self.web_probe {
            return state.container_answers
                && state.container.as_ref().is_some_and(|info| info.running);
        }
        false
    }
}

#[async_trait]
impl Accelerator for MockStack {
    async fn status(&self) -> AcceleratorStatus {
        self.lock()
            .accelerator
            .clone()
            .unwrap_or(AcceleratorStatus::Absent)
    }
}
