//! Singleton run guard backed by a pid file.
//!
//! At most one run holds the lock. A record whose owner is gone (or that
//! cannot be parsed) is stale and removed on sight. What happens when a live
//! owner outlasts the wait window is decided by [`LockPolicy`].

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::application::shutdown::Shutdown;
use crate::domain::LockRecord;
use crate::error::{LockError, Result};
use crate::infrastructure::config::lock::{LockConfig, LockPolicy};
use crate::port::outbound::ProcessTable;

/// Held (or degraded) run lock. Dropping it releases the record.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    held: bool,
    displaced: Option<u32>,
    unavailable: Option<String>,
}

impl LockGuard {
    fn held(path: &Path, displaced: Option<u32>) -> Self {
        Self {
            path: path.to_path_buf(),
            held: true,
            displaced,
            unavailable: None,
        }
    }

    fn unavailable(path: &Path, reason: String) -> Self {
        Self {
            path: path.to_path_buf(),
            held: false,
            displaced: None,
            unavailable: Some(reason),
        }
    }

    /// Whether the record was actually written.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.held
    }

    /// Pid whose live lock was forcibly removed, if any.
    #[must_use]
    pub const fn displaced(&self) -> Option<u32> {
        self.displaced
    }

    /// Why the run proceeds unlocked, if it does.
    #[must_use]
    pub fn unavailable_reason(&self) -> Option<&str> {
        self.unavailable.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the record now instead of at drop.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Run lock released"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "Failed to release run lock");
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Acquires the run lock.
pub struct LockManager {
    path: PathBuf,
    wait: Duration,
    interval: Duration,
    policy: LockPolicy,
    processes: Arc<dyn ProcessTable>,
    self_pid: u32,
}

impl LockManager {
    pub fn new(path: impl Into<PathBuf>, processes: Arc<dyn ProcessTable>) -> Self {
        let defaults = LockConfig::default();
        Self {
            path: path.into(),
            wait: defaults.wait(),
            interval: defaults.interval(),
            policy: defaults.on_timeout,
            processes,
            self_pid: std::process::id(),
        }
    }

    pub fn from_config(config: &LockConfig, processes: Arc<dyn ProcessTable>) -> Self {
        Self::new(config.path.clone(), processes)
            .wait(config.wait())
            .interval(config.interval())
            .policy(config.on_timeout)
    }

    #[must_use]
    pub const fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn self_pid(mut self, pid: u32) -> Self {
        self.self_pid = pid;
        self
    }

    /// Acquire the lock, polling while a live owner holds it.
    ///
    /// I/O failures never fail the run: the returned guard is then not held
    /// and carries the reason.
    ///
    /// # Errors
    ///
    /// [`LockError::Contended`] when the window elapses under
    /// [`LockPolicy::Fail`], [`LockError::Cancelled`] when shutdown arrives
    /// while waiting.
    pub async fn acquire(&self, shutdown: &Shutdown) -> Result<LockGuard> {
        let deadline = Instant::now() + self.wait;
        let mut displaced = None;

        loop {
            if shutdown.is_requested() {
                return Err(LockError::Cancelled.into());
            }

            match self.try_create() {
                Ok(()) => {
                    info!(path = %self.path.display(), pid = self.self_pid, "Run lock acquired");
                    return Ok(LockGuard::held(&self.path, displaced));
                }
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
                Err(error) => {
                    warn!(path = %self.path.display(), error = %error, "Run lock unavailable, proceeding unlocked");
                    return Ok(LockGuard::unavailable(&self.path, error.to_string()));
                }
            }

            let owner = self.read_owner();
            let live_owner = owner.filter(|pid| *pid != self.self_pid && self.processes.is_alive(*pid));

            let Some(owner_pid) = live_owner else {
                warn!(path = %self.path.display(), owner = ?owner, "Removing stale run lock");
                if let Err(error) = self.remove_record() {
                    warn!(error = %error, "Stale run lock could not be removed, proceeding unlocked");
                    return Ok(LockGuard::unavailable(&self.path, error.to_string()));
                }
                continue;
            };

            if Instant::now() >= deadline {
                match self.policy {
                    LockPolicy::Fail => {
                        return Err(LockError::Contended {
                            path: self.path.clone(),
                            owner_pid,
                        }
                        .into());
                    }
                    LockPolicy::Force => {
                        warn!(owner_pid, "Forcibly removing run lock held by live process");
                        if let Err(error) = self.remove_record() {
                            return Ok(LockGuard::unavailable(&self.path, error.to_string()));
                        }
                        displaced = Some(owner_pid);
                        continue;
                    }
                    LockPolicy::Wait => {
                        info!(owner_pid, "Run lock still held, continuing to wait");
                    }
                }
            } else {
                info!(owner_pid, "Waiting for run lock");
            }

            if shutdown.sleep(self.interval).await {
                return Err(LockError::Cancelled.into());
            }
        }
    }

    fn try_create(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        file.write_all(LockRecord::new(self.self_pid).render().as_bytes())?;
        file.sync_all()
    }

    fn read_owner(&self) -> Option<u32> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| LockRecord::parse(&content))
            .map(|record| record.owner_pid)
    }

    fn remove_record(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
            _ => Ok(()),
        }
    }
}
