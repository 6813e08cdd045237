//! Asset directory discovery.
//!
//! Candidates are tried in priority order and only a *valid* directory is
//! authoritative; an empty directory early in the list never shadows a
//! populated one later. When nothing valid exists, secondary volumes are
//! scanned, and failing that a directory is created.

use std::ffi::{CStr, CString, OsStr};
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::{AssetDirectory, DirectoryOrigin};
use crate::error::{Error, Result};
use crate::infrastructure::config::assets::AssetsConfig;

const MANIFESTS: &str = "manifests";
const BLOBS: &str = "blobs";

/// Home directory of `user` from the passwd database.
#[must_use]
pub fn home_of(user: &str) -> Option<PathBuf> {
    let name = CString::new(user).ok()?;
    // SAFETY: getpwnam returns null or a pointer to static storage that stays
    // valid until the next passwd call; the directory is copied out at once.
    unsafe {
        let entry = libc::getpwnam(name.as_ptr());
        if entry.is_null() || (*entry).pw_dir.is_null() {
            return None;
        }
        let dir = CStr::from_ptr((*entry).pw_dir);
        Some(PathBuf::from(OsStr::from_bytes(dir.to_bytes())))
    }
}

/// Home of the invoking user, falling back to the process home.
#[must_use]
pub fn invoking_home(user: Option<&str>) -> Option<PathBuf> {
    user.and_then(home_of).or_else(dirs::home_dir)
}

/// Expand a leading `~` against `home`.
#[must_use]
pub fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Count regular files below `path/manifests` and `path/blobs`.
#[must_use]
pub fn inventory(path: &Path) -> (usize, usize) {
    (count_files(&path.join(MANIFESTS)), count_files(&path.join(BLOBS)))
}

fn count_files(path: &Path) -> usize {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .count()
}

fn has_entries(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
}

/// Whether `path` holds model assets.
///
/// A directory qualifies when its manifest or blob subtree is non-empty or it
/// contains any regular file at all.
#[must_use]
pub fn is_valid(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    if has_entries(&path.join(MANIFESTS)) || has_entries(&path.join(BLOBS)) {
        return true;
    }
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_type().is_file())
}

/// Resolves the asset directory for a run.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    config: AssetsConfig,
    home: Option<PathBuf>,
}

impl DirectoryResolver {
    #[must_use]
    pub fn new(config: AssetsConfig, home: Option<PathBuf>) -> Self {
        Self { config, home }
    }

    /// Prioritised candidate list: user home, external hint, system fallbacks.
    #[must_use]
    pub fn candidates(&self) -> Vec<PathBuf> {
        let home = self.home.as_deref();
        let mut candidates = Vec::new();
        if let Some(home) = home {
            candidates.push(home.join(&self.config.home_subpath));
        }
        if let Some(hint) = &self.config.hint {
            candidates.push(expand_home(hint, home));
        }
        candidates.extend(
            self.config
                .fallbacks
                .iter()
                .map(|path| expand_home(path, home)),
        );

        let mut unique = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        unique
    }

    /// Secondary volume locations, sorted for a stable scan order.
    #[must_use]
    pub fn volume_candidates(&self) -> Vec<PathBuf> {
        let mut volumes = Vec::new();
        for root in &self.config.volume_roots {
            for volume in expand_root(root) {
                for subpath in &self.config.volume_subpaths {
                    volumes.push(volume.join(subpath));
                }
            }
        }
        volumes
    }

    /// First valid existing directory, without creating anything.
    #[must_use]
    pub fn find_existing(&self) -> Option<AssetDirectory> {
        for (index, candidate) in self.candidates().into_iter().enumerate() {
            if is_valid(&candidate) {
                return Some(Self::describe(candidate, DirectoryOrigin::Candidate(index)));
            }
            debug!(path = %candidate.display(), "Asset candidate not valid");
        }

        self.volume_candidates()
            .into_iter()
            .find(|path| is_valid(path))
            .map(|path| Self::describe(path, DirectoryOrigin::Volume))
    }

    /// Resolve the directory, creating one when nothing valid exists.
    ///
    /// # Errors
    ///
    /// Fails only when every creation attempt fails.
    pub fn resolve(&self) -> Result<AssetDirectory> {
        if let Some(found) = self.find_existing() {
            info!(
                path = %found.path().display(),
                manifests = found.manifests(),
                blobs = found.blobs(),
                "Asset directory resolved"
            );
            return Ok(found);
        }

        let attempts = self
            .candidates()
            .into_iter()
            .take(1)
            .chain(self.config.create_fallbacks.iter().cloned());

        let mut last_error = None;
        for path in attempts {
            match fs::create_dir_all(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "Created asset directory");
                    return Ok(Self::describe(path, DirectoryOrigin::Created));
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "Cannot create asset directory");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.map_or_else(
            || Error::driver("assets", "no asset directory candidates configured"),
            Error::Io,
        ))
    }

    /// The path used unverified when resolution fails.
    #[must_use]
    pub fn unverified(&self) -> AssetDirectory {
        let path = self
            .candidates()
            .into_iter()
            .next()
            .or_else(|| self.config.create_fallbacks.first().cloned())
            .unwrap_or_default();
        AssetDirectory::new(path, 0, 0, DirectoryOrigin::Unverified)
    }

    fn describe(path: PathBuf, origin: DirectoryOrigin) -> AssetDirectory {
        let (manifests, blobs) = inventory(&path);
        AssetDirectory::new(path, manifests, blobs, origin)
    }
}

/// Child directories of `root`; `prefix/*` yields grandchildren of `prefix`.
fn expand_root(root: &Path) -> Vec<PathBuf> {
    let roots = if root.file_name() == Some(OsStr::new("*")) {
        root.parent().map(child_dirs).unwrap_or_default()
    } else {
        vec![root.to_path_buf()]
    };
    roots.iter().flat_map(|root| child_dirs(root)).collect()
}

fn child_dirs(path: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(path) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_against_home() {
        let home = Path::new("/home/alice");
        assert_eq!(
            expand_home(Path::new("~/models"), Some(home)),
            PathBuf::from("/home/alice/models")
        );
        assert_eq!(
            expand_home(Path::new("/srv/models"), Some(home)),
            PathBuf::from("/srv/models")
        );
        assert_eq!(expand_home(Path::new("~/m"), None), PathBuf::from("~/m"));
    }

    #[test]
    fn validity_requires_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        assert!(!is_valid(&root.join("missing")));
        assert!(!is_valid(root));

        fs::create_dir_all(root.join("manifests")).unwrap();
        assert!(!is_valid(root));

        fs::create_dir_all(root.join("manifests/registry.ollama.ai")).unwrap();
        assert!(is_valid(root));
    }

    #[test]
    fn stray_file_makes_directory_valid() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/file"), "x").unwrap();
        assert!(is_valid(dir.path()));
    }

    #[test]
    fn inventory_counts_files_per_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("manifests/registry/library/llama3")).unwrap();
        fs::write(root.join("manifests/registry/library/llama3/latest"), "{}").unwrap();
        fs::create_dir_all(root.join("blobs")).unwrap();
        fs::write(root.join("blobs/sha256-a"), "a").unwrap();
        fs::write(root.join("blobs/sha256-b"), "b").unwrap();

        assert_eq!(inventory(root), (1, 2));
    }

    #[test]
    fn star_root_expands_one_level_deeper() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        fs::create_dir_all(media.join("alice/usb")).unwrap();
        fs::create_dir_all(media.join("bob")).unwrap();

        assert_eq!(
            expand_root(&media),
            vec![media.join("alice"), media.join("bob")]
        );
        assert_eq!(expand_root(&media.join("*")), vec![media.join("alice/usb")]);
    }

    #[test]
    fn candidates_are_deduplicated_in_priority_order() {
        let config = AssetsConfig {
            hint: Some(PathBuf::from("~/.ollama/models")),
            fallbacks: vec![PathBuf::from("/var/lib/ollama/models")],
            ..AssetsConfig::default()
        };
        let resolver = DirectoryResolver::new(config, Some(PathBuf::from("/home/alice")));

        assert_eq!(
            resolver.candidates(),
            vec![
                PathBuf::from("/home/alice/.ollama/models"),
                PathBuf::from("/var/lib/ollama/models"),
            ]
        );
    }
}
