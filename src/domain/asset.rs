//! Model assets, their on-disk directory and accelerator-maximized derivations.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// How the asset directory was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum DirectoryOrigin {
    /// Existing valid candidate at this priority index.
    Candidate(usize),
    /// Found on a mounted secondary volume.
    Volume,
    /// Created because nothing valid existed.
    Created,
    /// Nothing could be found or created; path used as-is.
    Unverified,
}

/// A resolved model asset root with inventory statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetDirectory {
    path: PathBuf,
    manifests: usize,
    blobs: usize,
    origin: DirectoryOrigin,
}

impl AssetDirectory {
    #[must_use]
    pub fn new(path: PathBuf, manifests: usize, blobs: usize, origin: DirectoryOrigin) -> Self {
        Self {
            path,
            manifests,
            blobs,
            origin,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn manifests(&self) -> usize {
        self.manifests
    }

    #[must_use]
    pub const fn blobs(&self) -> usize {
        self.blobs
    }

    #[must_use]
    pub const fn origin(&self) -> DirectoryOrigin {
        self.origin
    }

    /// Path as a string for environment injection.
    #[must_use]
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// A model known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelAsset {
    pub name: String,
}

impl ModelAsset {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name with the implicit `:latest` tag removed.
    #[must_use]
    pub fn canonical_name(&self) -> &str {
        canonical_name(&self.name)
    }

    /// Whether this asset is itself a derivation with `suffix`.
    #[must_use]
    pub fn is_derived(&self, suffix: &str) -> bool {
        let base = self.canonical_name();
        let base = base.split_once(':').map_or(base, |(name, _)| name);
        base.ends_with(&format!("-{suffix}"))
    }
}

/// Strip a trailing `:latest` tag.
#[must_use]
pub fn canonical_name(name: &str) -> &str {
    name.strip_suffix(":latest").unwrap_or(name)
}

/// Target name for a derivation of `base`.
///
/// `:latest` is dropped, any other tag is folded into the name so the result
/// stays a valid untagged model name: `llama3:8b` becomes `llama3-8b-maxgpu`.
#[must_use]
pub fn derived_name(base: &str, suffix: &str) -> String {
    let base = canonical_name(base).replace(':', "-");
    format!("{base}-{suffix}")
}

/// Fixed parameter overlay applied to every derivation.
///
/// Field names are the runtime's model parameter keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    /// Layers offloaded to the accelerator; a large value offloads everything.
    pub num_gpu: u32,
    pub num_thread: u32,
    pub num_ctx: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f64,
}

/// A derivation request: base asset plus overlay under a distinct name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedModelAsset {
    pub name: String,
    pub base: String,
    pub overlay: Overlay,
}

impl DerivedModelAsset {
    #[must_use]
    pub fn for_base(base: &ModelAsset, suffix: &str, overlay: Overlay) -> Self {
        Self {
            name: derived_name(&base.name, suffix),
            base: base.name.clone(),
            overlay,
        }
    }
}

/// Per-item result of the derivation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum DerivationResult {
    Created,
    Skipped,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_name_drops_latest_tag() {
        assert_eq!(derived_name("modelA", "maxgpu"), "modelA-maxgpu");
        assert_eq!(derived_name("modelA:latest", "maxgpu"), "modelA-maxgpu");
        assert_eq!(derived_name("llama3:8b", "maxgpu"), "llama3-8b-maxgpu");
    }

    #[test]
    fn derived_assets_are_recognized() {
        assert!(ModelAsset::new("modelA-maxgpu:latest").is_derived("maxgpu"));
        assert!(ModelAsset::new("llama3-8b-maxgpu").is_derived("maxgpu"));
        assert!(!ModelAsset::new("modelA").is_derived("maxgpu"));
        assert!(!ModelAsset::new("maxgpu").is_derived("maxgpu"));
    }
}
