//! Container engine port.

use async_trait::async_trait;

use crate::domain::ImageRef;
use crate::error::Result;

/// A bind or volume mount on an existing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: String,
    pub destination: String,
}

/// Typed result of inspecting a named container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub image: String,
    /// Content digest of the image the container runs, when the engine knows it.
    pub image_digest: Option<String>,
    pub running: bool,
    pub mounts: Vec<Mount>,
    pub env: Vec<(String, String)>,
}

impl ContainerInfo {
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn mount_source(&self, destination: &str) -> Option<&str> {
        self.mounts
            .iter()
            .find(|mount| mount.destination == destination)
            .map(|mount| mount.source.as_str())
    }
}

/// Everything needed to create and start the front-end container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageRef,
    /// `(host, container)` port pairs.
    pub ports: Vec<(u16, u16)>,
    /// `(source, destination)` mounts; named volumes and bind mounts alike.
    pub volumes: Vec<(String, String)>,
    pub env: Vec<(String, String)>,
    pub extra_hosts: Vec<String>,
    pub gpus: bool,
    pub restart: String,
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Inspect a container by name; `None` when it does not exist.
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>>;

    /// Digest of the locally cached image for `image`'s tag, if any.
    async fn local_image_digest(&self, image: &ImageRef) -> Result<Option<String>>;

    async fn pull(&self, image: &ImageRef) -> Result<()>;

    /// Create and start a container.
    async fn run(&self, spec: &ContainerSpec) -> Result<()>;

    async fn start(&self, name: &str) -> Result<()>;

    async fn stop(&self, name: &str) -> Result<()>;

    /// Remove a stopped container. Volumes are always left in place.
    async fn remove(&self, name: &str) -> Result<()>;
}
