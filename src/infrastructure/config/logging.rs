//! Logging configuration and initialization.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Deserialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
    /// Run log appended across runs. `None` disables the file layer.
    #[serde(default = "default_file")]
    pub file: Option<PathBuf>,
}

fn default_level() -> String {
    "info".into()
}

fn default_format() -> String {
    "pretty".into()
}

fn default_file() -> Option<PathBuf> {
    Some(PathBuf::from("/var/log/stackwarden.log"))
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    ///
    /// Console output goes to stderr so operator output on stdout stays
    /// clean. A log file that cannot be opened is reported and skipped.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let console = match self.format.as_str() {
            "json" => fmt::layer().json().with_writer(std::io::stderr).boxed(),
            _ => fmt::layer().with_writer(std::io::stderr).boxed(),
        };

        let mut file_error = None;
        let file_layer = self.file.as_deref().and_then(|path| match open_append(path) {
            Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            Err(error) => {
                file_error = Some((path.to_path_buf(), error));
                None
            }
        });

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .with(file_layer)
            .try_init();

        if let Some((path, error)) = file_error {
            tracing::warn!(path = %path.display(), error = %error, "Run log unavailable");
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            file: default_file(),
        }
    }
}
