//! Source scanning for the layer contract tests.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A source line that matched a layer rule.
#[derive(Debug)]
pub struct Hit {
    pub file: String,
    pub line: usize,
    pub text: String,
}

fn crate_root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

/// Every `.rs` file below `layer`, with its path relative to the crate root.
fn sources(layer: &str) -> Vec<(String, String)> {
    let mut files: Vec<PathBuf> = WalkDir::new(crate_root().join(layer))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "rs"))
        .collect();
    files.sort();

    files
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
            let relative = path
                .strip_prefix(crate_root())
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            (relative, content)
        })
        .collect()
}

/// Lines under `layer` mentioning any of `forbidden`.
pub fn find_lines_containing(layer: &str, forbidden: &[&str]) -> Vec<Hit> {
    sources(layer)
        .into_iter()
        .flat_map(|(file, content)| {
            content
                .lines()
                .enumerate()
                .filter(|(_, text)| forbidden.iter().any(|needle| text.contains(needle)))
                .map(|(idx, text)| Hit {
                    file: file.clone(),
                    line: idx + 1,
                    text: text.to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn read_relative(relative_path: &str) -> String {
    fs::read_to_string(crate_root().join(relative_path))
        .unwrap_or_else(|e| panic!("failed to read {relative_path}: {e}"))
}

fn is_declaration(line: &str) -> bool {
    line.is_empty()
        || line.starts_with("//")
        || line.starts_with("#[cfg")
        || ["pub mod ", "pub(crate) mod ", "mod "]
            .iter()
            .any(|prefix| line.starts_with(prefix))
}

/// `mod.rs` lines that neither declare a module nor re-export one.
pub fn find_non_export_lines_in_mod_files(layer: &str) -> Vec<Hit> {
    let mut hits = Vec::new();
    for (file, content) in sources(layer) {
        if !file.ends_with("/mod.rs") {
            continue;
        }
        let mut continued = false;
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if continued || line.starts_with("pub use ") {
                continued = !line.ends_with(';');
                continue;
            }
            if !is_declaration(line) {
                hits.push(Hit {
                    file: file.clone(),
                    line: idx + 1,
                    text: raw.to_string(),
                });
            }
        }
    }
    hits
}
