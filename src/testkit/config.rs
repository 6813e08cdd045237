//! Canonical test configurations.
//!
//! Every path lives under a caller-provided root and every wait is zero or a
//! single short probe window, so pipeline tests never sleep.

use std::path::Path;

use crate::infrastructure::config::assets::AssetsConfig;
use crate::infrastructure::config::service::{ProbeConfig, ReclaimConfig};
use crate::infrastructure::config::settings::Config;

/// Probe window of two immediate attempts.
pub const fn fast_probe() -> ProbeConfig {
    ProbeConfig {
        attempts: 2,
        interval_secs: 0,
    }
}

/// Reclamation without settle or grace pauses.
pub const fn fast_reclaim() -> ReclaimConfig {
    ReclaimConfig {
        attempts: 2,
        settle_ms: 0,
        grace_secs: 0,
    }
}

/// Assets resolved only from `root/models`, with or without a home.
pub fn isolated_assets(root: &Path) -> AssetsConfig {
    let models = root.join("models");
    AssetsConfig {
        home_subpath: models.display().to_string(),
        hint: Some(models),
        fallbacks: Vec::new(),
        volume_roots: Vec::new(),
        volume_subpaths: Vec::new(),
        create_fallbacks: Vec::new(),
    }
}

/// Full configuration rooted at `root` with fast waits and no log file.
pub fn stack(root: &Path) -> Config {
    let mut config = Config::default();
    config.logging.file = None;
    config.lock.path = root.join("run.lock");
    config.lock.wait_secs = 0;
    config.assets = isolated_assets(root);
    config.runtime.health = fast_probe();
    config.runtime.override_path = root.join("override.conf");
    config.container.health = fast_probe();
    config.reclaim = fast_reclaim();
    config.report.status_file = Some(root.join("last-run.json"));
    config.invoking_user = None;
    config
}
