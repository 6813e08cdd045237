//! Host process table backed by `/proc`, `kill(2)` and the usual socket tools.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::adapter::outbound::exec;
use crate::error::{Error, Result};
use crate::port::outbound::{ProcessTable, Signal};

const TOOL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HostProcessTable {
    proc_root: PathBuf,
}

impl HostProcessTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
        }
    }

    async fn tool_output(&self, program: &str, args: &[&str]) -> Result<String> {
        match exec::run(program, args, TOOL_TIMEOUT).await {
            Ok(captured) => Ok(captured.stdout),
            Err(error) if exec::is_not_found(&error) => {
                debug!(program, "tool not installed");
                Ok(String::new())
            }
            Err(error) => Err(error),
        }
    }
}

impl Default for HostProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

fn to_raw_pid(pid: u32) -> Option<libc::pid_t> {
    if pid == 0 {
        return None;
    }
    libc::pid_t::try_from(pid).ok()
}

/// Pids listed one per line, as printed by `lsof -t`.
#[must_use]
pub fn parse_pid_lines(output: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .filter(|pid| *pid != 0)
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

/// Pids from `users:(("name",pid=123,fd=4))` fragments in `ss -p` output.
#[must_use]
pub fn parse_ss_pids(output: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .split("pid=")
        .skip(1)
        .filter_map(|fragment| {
            let digits: String = fragment.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .filter(|pid| *pid != 0)
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

#[async_trait]
impl ProcessTable for HostProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        let Some(raw) = to_raw_pid(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs the permission and existence check only.
        let result = unsafe { libc::kill(raw, 0) };
        if result == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    fn find(&self, pattern: &str) -> Vec<u32> {
        let Ok(entries) = fs::read_dir(&self.proc_root) else {
            return Vec::new();
        };

        let mut pids: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
                let raw = fs::read(entry.path().join("cmdline")).ok()?;
                let cmdline = String::from_utf8_lossy(&raw).replace('\0', " ");
                cmdline.trim().contains(pattern).then_some(pid)
            })
            .collect();
        pids.sort_unstable();
        pids
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<()> {
        let raw = to_raw_pid(pid)
            .ok_or_else(|| Error::driver("process", format!("invalid pid {pid}")))?;
        let signo = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        // SAFETY: plain kill(2) on a validated positive pid.
        let result = unsafe { libc::kill(raw, signo) };
        if result == 0 {
            return Ok(());
        }
        let error = std::io::Error::last_os_error();
        if error.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(error.into())
    }

    async fn kill_port_owner(&self, port: u16) -> Result<()> {
        let target = format!("{port}/tcp");
        // Non-zero exit only means nothing owned the port.
        self.tool_output("fuser", &["-k", &target]).await?;
        Ok(())
    }

    async fn connection_owners(&self, port: u16) -> Result<Vec<u32>> {
        let target = format!("TCP:{port}");
        let output = self.tool_output("lsof", &["-t", "-i", &target]).await?;
        Ok(parse_pid_lines(&output))
    }

    async fn socket_owners(&self, port: u16) -> Result<Vec<u32>> {
        let filter = format!("sport = :{port}");
        let output = self.tool_output("ss", &["-Htlpn", &filter]).await?;
        Ok(parse_ss_pids(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_alive() {
        let table = HostProcessTable::new();
        assert!(table.is_alive(std::process::id()));
        assert!(!table.is_alive(0));
        assert!(!table.is_alive(u32::MAX));
    }

    #[test]
    fn find_matches_own_command_line() {
        let table = HostProcessTable::new();
        let own = std::process::id();
        let exe = std::env::args().next().unwrap();
        assert!(table.find(&exe).contains(&own));
        assert!(table.find("stackwarden-pattern-that-matches-nothing-\u{1}").is_empty());
    }

    #[test]
    fn parses_lsof_pid_lines() {
        assert_eq!(parse_pid_lines("123\n456\n123\n\nbogus\n"), vec![123, 456]);
    }

    #[test]
    fn parses_ss_process_column() {
        let output = "LISTEN 0 4096 0.0.0.0:11434 0.0.0.0:* \
                      users:((\"ollama\",pid=812,fd=3),(\"ollama\",pid=813,fd=3))\n\
                      LISTEN 0 4096 [::]:11434 [::]:* users:((\"ollama\",pid=812,fd=4))\n";
        assert_eq!(parse_ss_pids(output), vec![812, 813]);
        assert!(parse_ss_pids("").is_empty());
    }
}
