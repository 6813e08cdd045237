//! Bounded external command execution shared by the shelling-out adapters.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub(crate) struct Captured {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    /// Trimmed stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Run `program` with `args` to completion, killing it after `timeout`.
///
/// A non-zero exit is not an error here; callers decide what it means.
pub(crate) async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<Captured> {
    debug!(program, ?args, "exec");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| Error::Timeout(timeout))??;

    Ok(Captured {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Like [`run`], but a non-zero exit becomes a driver error.
pub(crate) async fn run_checked(
    driver: &'static str,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Captured> {
    let captured = run(program, args, timeout).await?;
    if captured.success {
        Ok(captured)
    } else {
        Err(Error::driver(
            driver,
            format!(
                "`{program} {}` exited with {}: {}",
                args.join(" "),
                captured
                    .code
                    .map_or_else(|| "signal".to_string(), |code| code.to_string()),
                captured.diagnostic()
            ),
        ))
    }
}

/// Whether `error` means the program itself is not installed.
pub(crate) fn is_not_found(error: &Error) -> bool {
    matches!(error, Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_output_and_status() {
        let captured = run("sh", &["-c", "echo out; echo err >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!captured.success);
        assert_eq!(captured.code, Some(3));
        assert_eq!(captured.stdout.trim(), "out");
        assert_eq!(captured.diagnostic(), "err");
    }

    #[tokio::test]
    async fn checked_run_reports_driver_failure() {
        let error = run_checked("test", "sh", &["-c", "exit 1"], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Driver { driver: "test", .. }));
    }

    #[tokio::test]
    async fn missing_program_is_detected() {
        let error = run("stackwarden-no-such-binary", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(is_not_found(&error));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let error = run("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Timeout(_)));
    }
}
