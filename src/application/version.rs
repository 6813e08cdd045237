//! Version checks for both services.
//!
//! Driver failures degrade into unknown inputs; the comparators in
//! [`crate::domain::version`] turn those into the per-service decision.

use tracing::{info, warn};

use crate::domain::version::{compare_container, compare_runtime, Deployed};
use crate::domain::{ImageRef, Latest, VersionState};
use crate::port::outbound::{ContainerEngine, ImageRegistry, ReleaseFeed, RuntimeService};

/// Installed runtime version against the release feed.
pub async fn check_runtime(
    runtime: &dyn RuntimeService,
    releases: &dyn ReleaseFeed,
) -> VersionState {
    let installed = match runtime.installed_version().await {
        Ok(version) => version,
        Err(error) => {
            warn!(error = %error, "Installed runtime version unknown");
            None
        }
    };

    let latest = match releases.latest_version().await {
        Ok(tag) => Latest::Known(tag),
        Err(error) => {
            warn!(error = %error, "Release feed unreachable");
            Latest::Unreachable
        }
    };

    let state = compare_runtime(installed.as_deref(), latest);
    info!(
        current = state.current.as_deref().unwrap_or("none"),
        latest = ?state.latest,
        decision = %state.decision,
        "Runtime version checked"
    );
    state
}

/// Deployed container digest against the registry, falling back to the
/// locally cached image for the same tag.
pub async fn check_container(
    containers: &dyn ContainerEngine,
    registry: &dyn ImageRegistry,
    name: &str,
    image: &ImageRef,
) -> VersionState {
    let deployed = match containers.inspect(name).await {
        Ok(Some(info)) => Deployed::Present {
            digest: info.image_digest,
        },
        Ok(None) => Deployed::Absent,
        Err(error) => {
            warn!(container = name, error = %error, "Container inspection failed");
            Deployed::Present { digest: None }
        }
    };

    let remote = match registry.remote_digest(image).await {
        Ok(digest) => Some(digest),
        Err(error) => {
            warn!(image = %image, error = %error, "Registry unreachable");
            None
        }
    };

    let local = if remote.is_none() && deployed != Deployed::Absent {
        match containers.local_image_digest(image).await {
            Ok(digest) => digest,
            Err(error) => {
                warn!(image = %image, error = %error, "Local image digest unavailable");
                None
            }
        }
    } else {
        None
    };

    let state = compare_container(&deployed, remote.as_deref(), local.as_deref());
    info!(
        current = state.current.as_deref().unwrap_or("none"),
        latest = ?state.latest,
        decision = %state.decision,
        "Container image checked"
    );
    state
}
