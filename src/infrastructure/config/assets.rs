//! Asset directory search configuration.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Path below the invoking user's home checked first.
    #[serde(default = "default_home_subpath")]
    pub home_subpath: String,
    /// External hint, checked second. Overridden by `STACKWARDEN_MODELS_DIR`
    /// or `OLLAMA_MODELS`.
    #[serde(default)]
    pub hint: Option<PathBuf>,
    /// System fallback candidates, checked in order after the hint.
    #[serde(default = "default_fallbacks")]
    pub fallbacks: Vec<PathBuf>,
    /// Roots whose children are scanned as mounted secondary volumes. A
    /// trailing `/*` expands to every directory below the prefix.
    #[serde(default = "default_volume_roots")]
    pub volume_roots: Vec<PathBuf>,
    /// Conventional subpaths looked up on each secondary volume.
    #[serde(default = "default_volume_subpaths")]
    pub volume_subpaths: Vec<String>,
    /// Roots tried in order when the first-priority path cannot be created.
    #[serde(default = "default_create_fallbacks")]
    pub create_fallbacks: Vec<PathBuf>,
}

fn default_home_subpath() -> String {
    ".ollama/models".into()
}

fn default_fallbacks() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/share/ollama/.ollama/models"),
        PathBuf::from("/var/lib/ollama/models"),
        PathBuf::from("/opt/ollama/models"),
    ]
}

fn default_volume_roots() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/mnt"),
        PathBuf::from("/media"),
        PathBuf::from("/media/*"),
    ]
}

fn default_volume_subpaths() -> Vec<String> {
    vec!["ollama/models".into(), ".ollama/models".into()]
}

fn default_create_fallbacks() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/var/lib/ollama/models"),
        PathBuf::from("/tmp/ollama/models"),
    ]
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            home_subpath: default_home_subpath(),
            hint: None,
            fallbacks: default_fallbacks(),
            volume_roots: default_volume_roots(),
            volume_subpaths: default_volume_subpaths(),
            create_fallbacks: default_create_fallbacks(),
        }
    }
}
