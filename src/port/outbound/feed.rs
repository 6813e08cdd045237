//! Upstream release sources.

use async_trait::async_trait;

use crate::domain::ImageRef;
use crate::error::Result;

/// Published release feed for the native runtime.
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// Latest published version identifier (e.g. a tag name).
    async fn latest_version(&self) -> Result<String>;
}

/// Image registry manifest endpoint.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Content digest the registry currently serves for `image`'s tag.
    async fn remote_digest(&self, image: &ImageRef) -> Result<String>;
}
