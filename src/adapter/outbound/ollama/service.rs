//! systemd-managed runtime service.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::adapter::outbound::exec;
use crate::error::{Error, Result};
use crate::infrastructure::config::runtime::RuntimeConfig;
use crate::port::outbound::{RuntimeEnv, RuntimeService};

const DRIVER: &str = "systemd";
const SYSTEMCTL_TIMEOUT: Duration = Duration::from_secs(60);
const VERSION_TIMEOUT: Duration = Duration::from_secs(15);

/// Runtime controlled through `systemctl` and a drop-in override file.
#[derive(Debug, Clone)]
pub struct SystemdRuntime {
    unit: String,
    binary: String,
    install_command: String,
    install_timeout: Duration,
    override_path: PathBuf,
}

impl SystemdRuntime {
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            unit: config.unit.clone(),
            binary: config.binary.clone(),
            install_command: config.install_command.clone(),
            install_timeout: config.install_timeout(),
            override_path: config.override_path.clone(),
        }
    }

    async fn systemctl(&self, args: &[&str]) -> Result<()> {
        exec::run_checked(DRIVER, "systemctl", args, SYSTEMCTL_TIMEOUT).await?;
        Ok(())
    }
}

/// Render `env` as a systemd `[Service]` drop-in.
#[must_use]
pub fn render_override(env: &RuntimeEnv) -> String {
    let mut content = String::from("[Service]\n");
    for (key, value) in env.iter() {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        content.push_str(&format!("Environment=\"{key}={escaped}\"\n"));
    }
    content
}

/// Write `content` to `path` unless it already holds exactly that.
///
/// Returns `true` when the file was written.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    match fs::read_to_string(path) {
        Ok(existing) if existing == content => return Ok(false),
        Ok(_) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => return Err(error.into()),
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(true)
}

/// Pull the version token out of `<binary> --version` output.
///
/// The client prints warnings when no server is running, so the last line
/// mentioning a version is used.
#[must_use]
pub fn parse_version_output(output: &str) -> Option<String> {
    output
        .lines()
        .rev()
        .find(|line| line.to_ascii_lowercase().contains("version"))
        .and_then(|line| line.split_whitespace().last())
        .map(ToString::to_string)
}

#[async_trait]
impl RuntimeService for SystemdRuntime {
    async fn installed_version(&self) -> Result<Option<String>> {
        let captured = match exec::run(&self.binary, &["--version"], VERSION_TIMEOUT).await {
            Ok(captured) => captured,
            Err(error) if exec::is_not_found(&error) => return Ok(None),
            Err(error) => return Err(error),
        };
        let combined = format!("{}\n{}", captured.stderr, captured.stdout);
        Ok(parse_version_output(&combined))
    }

    async fn install(&self) -> Result<()> {
        info!(command = %self.install_command, "Running runtime installer");
        exec::run_checked(
            "installer",
            "sh",
            &["-c", &self.install_command],
            self.install_timeout,
        )
        .await?;
        Ok(())
    }

    async fn is_active(&self) -> Result<bool> {
        let captured = exec::run(
            "systemctl",
            &["is-active", "--quiet", &self.unit],
            SYSTEMCTL_TIMEOUT,
        )
        .await?;
        Ok(captured.success)
    }

    async fn start(&self) -> Result<()> {
        // Enabling is best-effort; hosts without the unit file fail at start.
        if let Err(error) = self.systemctl(&["enable", &self.unit]).await {
            debug!(unit = %self.unit, error = %error, "systemctl enable failed");
        }
        self.systemctl(&["start", &self.unit]).await
    }

    async fn stop(&self) -> Result<()> {
        self.systemctl(&["stop", &self.unit]).await
    }

    async fn apply_environment(&self, env: &RuntimeEnv) -> Result<bool> {
        let content = render_override(env);
        let changed = write_if_changed(&self.override_path, &content)?;
        if changed {
            info!(path = %self.override_path.display(), "Runtime override updated");
            self.systemctl(&["daemon-reload"]).await?;
        }
        Ok(changed)
    }

    async fn spawn_transient(&self, env: &RuntimeEnv) -> Result<u32> {
        let mut child = Command::new(&self.binary)
            .arg("serve")
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| Error::driver(DRIVER, "transient runtime exited immediately"))?;

        // Reap on exit so a terminated instance never lingers as a zombie.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(pid, %status, "Transient runtime exited"),
                Err(error) => warn!(pid, error = %error, "Waiting on transient runtime failed"),
            }
        });
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::host::HostProcessTable;
    use crate::port::outbound::ProcessTable;

    #[tokio::test]
    async fn exited_transient_is_reaped() {
        let config = RuntimeConfig {
            binary: "true".into(),
            ..RuntimeConfig::default()
        };
        let pid = SystemdRuntime::new(&config)
            .spawn_transient(&RuntimeEnv::new())
            .await
            .unwrap();

        let processes = HostProcessTable::new();
        let mut gone = false;
        for _ in 0..100 {
            if !processes.is_alive(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "pid {pid} still present after exit");
    }

    #[test]
    fn override_lists_environment_in_order() {
        let env = RuntimeEnv::new()
            .with("OLLAMA_MODELS", "/srv/models")
            .with("OLLAMA_HOST", "0.0.0.0:11434");

        assert_eq!(
            render_override(&env),
            "[Service]\n\
             Environment=\"OLLAMA_MODELS=/srv/models\"\n\
             Environment=\"OLLAMA_HOST=0.0.0.0:11434\"\n"
        );
    }

    #[test]
    fn override_escapes_quotes() {
        let env = RuntimeEnv::new().with("NOTE", "say \"hi\"");
        assert!(render_override(&env).contains(r#"Environment="NOTE=say \"hi\"""#));
    }

    #[test]
    fn unchanged_override_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ollama.service.d").join("override.conf");

        assert!(write_if_changed(&path, "[Service]\n").unwrap());
        assert!(!write_if_changed(&path, "[Service]\n").unwrap());
        assert!(write_if_changed(&path, "[Service]\nEnvironment=\"A=1\"\n").unwrap());
    }

    #[test]
    fn version_output_ignores_client_warnings() {
        let output = "Warning: could not connect to a running Ollama instance\n\
                      Warning: client version is 0.5.7\n";
        assert_eq!(parse_version_output(output).as_deref(), Some("0.5.7"));
        assert_eq!(
            parse_version_output("ollama version is 0.6.2").as_deref(),
            Some("0.6.2")
        );
        assert_eq!(parse_version_output("command not understood"), None);
    }
}
