//! Container engine driven through the `docker` CLI.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::adapter::outbound::exec;
use crate::domain::ImageRef;
use crate::error::{Error, Result};
use crate::port::outbound::{ContainerEngine, ContainerInfo, ContainerSpec, Mount};

const DRIVER: &str = "docker";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    pull_timeout: Duration,
}

impl DockerCli {
    #[must_use]
    pub fn new(pull_timeout: Duration) -> Self {
        Self {
            binary: "docker".into(),
            pull_timeout,
        }
    }

    async fn checked(&self, args: &[&str], timeout: Duration) -> Result<exec::Captured> {
        exec::run_checked(DRIVER, &self.binary, args, timeout).await
    }

    async fn repo_digests(&self, image: &str) -> Result<Option<Vec<String>>> {
        let captured = exec::run(
            &self.binary,
            &["image", "inspect", "--format", "{{json .RepoDigests}}", image],
            COMMAND_TIMEOUT,
        )
        .await?;
        if !captured.success {
            if is_missing(&captured.stderr) {
                return Ok(None);
            }
            return Err(Error::driver(DRIVER, captured.diagnostic()));
        }
        let digests: Option<Vec<String>> = serde_json::from_str(captured.stdout.trim())?;
        Ok(Some(digests.unwrap_or_default()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    image: String,
    state: InspectState,
    #[serde(default)]
    mounts: Vec<InspectMount>,
    config: InspectConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    running: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectMount {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    source: String,
    destination: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
    #[serde(default)]
    env: Option<Vec<String>>,
}

fn is_missing(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("no such") || stderr.contains("not found")
}

/// Convert one `docker inspect` entry into the port's typed view.
///
/// Named volumes report their volume name as the source so they compare
/// against the configured volume rather than the engine's storage path.
/// The image id is returned alongside; the digest is resolved from it.
fn to_info(entry: InspectEntry) -> (ContainerInfo, String) {
    let mounts = entry
        .mounts
        .into_iter()
        .map(|mount| Mount {
            source: mount.name.filter(|name| !name.is_empty()).unwrap_or(mount.source),
            destination: mount.destination,
        })
        .collect();

    let env = entry
        .config
        .env
        .unwrap_or_default()
        .into_iter()
        .filter_map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect();

    let info = ContainerInfo {
        id: entry.id,
        image: entry.config.image,
        image_digest: None,
        running: entry.state.running,
        mounts,
        env,
    };
    (info, entry.image)
}

/// Pick the repo digest belonging to `name` from an image's `RepoDigests`.
#[must_use]
pub fn pick_repo_digest(digests: &[String], name: &str) -> Option<String> {
    digests
        .iter()
        .find(|entry| {
            entry
                .split_once('@')
                .is_some_and(|(repository, _)| repository == name)
        })
        .cloned()
}

/// Arguments for `docker run` creating `spec`.
#[must_use]
pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--restart".to_string(),
        spec.restart.clone(),
    ];
    for (host, container) in &spec.ports {
        args.push("-p".into());
        args.push(format!("{host}:{container}"));
    }
    for (source, destination) in &spec.volumes {
        args.push("-v".into());
        args.push(format!("{source}:{destination}"));
    }
    for (key, value) in &spec.env {
        args.push("-e".into());
        args.push(format!("{key}={value}"));
    }
    for host in &spec.extra_hosts {
        args.push("--add-host".into());
        args.push(host.clone());
    }
    if spec.gpus {
        args.push("--gpus".into());
        args.push("all".into());
    }
    args.push(spec.image.to_string());
    args
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let captured = exec::run(
            &self.binary,
            &["inspect", "--type", "container", name],
            COMMAND_TIMEOUT,
        )
        .await?;
        if !captured.success {
            if is_missing(&captured.stderr) {
                return Ok(None);
            }
            return Err(Error::driver(DRIVER, captured.diagnostic()));
        }

        let entries: Vec<InspectEntry> = serde_json::from_str(&captured.stdout)?;
        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };
        let (mut info, image_id) = to_info(entry);

        // The container records an image id; the registry speaks repo digests.
        let name = ImageRef::parse(&info.image).map(|image| image.name()).ok();
        info.image_digest = match (self.repo_digests(&image_id).await?, name) {
            (Some(digests), Some(name)) => pick_repo_digest(&digests, &name),
            _ => None,
        };
        Ok(Some(info))
    }

    async fn local_image_digest(&self, image: &ImageRef) -> Result<Option<String>> {
        Ok(self
            .repo_digests(&image.to_string())
            .await?
            .and_then(|digests| pick_repo_digest(&digests, &image.name())))
    }

    async fn pull(&self, image: &ImageRef) -> Result<()> {
        info!(image = %image, "Pulling image");
        self.checked(&["pull", &image.to_string()], self.pull_timeout)
            .await?;
        Ok(())
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<()> {
        let args = run_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.checked(&args, COMMAND_TIMEOUT).await?;
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.checked(&["start", name], COMMAND_TIMEOUT).await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.checked(&["stop", name], COMMAND_TIMEOUT).await?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.checked(&["rm", name], COMMAND_TIMEOUT).await?;
        Ok(())
    }
}
