//! Port and process reclamation.
//!
//! Every method is best-effort: failures are logged and the next method
//! runs. The orchestrator's own pid is never signalled.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::infrastructure::config::service::ReclaimConfig;
use crate::port::outbound::{PortProbe, ProcessTable, Signal};

pub struct Reclaimer {
    processes: Arc<dyn ProcessTable>,
    ports: Arc<dyn PortProbe>,
    config: ReclaimConfig,
    self_pid: u32,
}

impl Reclaimer {
    pub fn new(
        processes: Arc<dyn ProcessTable>,
        ports: Arc<dyn PortProbe>,
        config: ReclaimConfig,
        self_pid: u32,
    ) -> Self {
        Self {
            processes,
            ports,
            config,
            self_pid,
        }
    }

    /// Free `port` through three independent kernel views, pausing between
    /// methods so the kernel can release the socket.
    pub async fn reclaim_port(&self, port: u16) {
        info!(port, "Reclaiming port");

        // fuser cannot exclude pids, so it is skipped whenever this process
        // holds a socket on the port itself.
        let connections = self.lookup("connection table", port, true).await;
        let sockets = self.lookup("socket table", port, false).await;
        if connections.contains(&self.self_pid) || sockets.contains(&self.self_pid) {
            debug!(port, "Own process holds the port, skipping port-owner kill");
        } else if let Err(error) = self.processes.kill_port_owner(port).await {
            warn!(port, error = %error, "Port-owner termination failed");
        }
        tokio::time::sleep(self.config.settle()).await;

        let connections = self.lookup("connection table", port, true).await;
        self.kill_all(&connections);
        tokio::time::sleep(self.config.settle()).await;

        let sockets = self.lookup("socket table", port, false).await;
        self.kill_all(&sockets);
    }

    /// Terminate processes whose command line contains `pattern`: graceful
    /// first, forceful for survivors after the grace period.
    ///
    /// Returns the number of processes signalled.
    pub async fn reclaim_processes(&self, pattern: &str) -> usize {
        let targets: Vec<u32> = self
            .processes
            .find(pattern)
            .into_iter()
            .filter(|pid| *pid != self.self_pid)
            .collect();
        if targets.is_empty() {
            return 0;
        }

        info!(pattern, count = targets.len(), "Terminating matching processes");
        for pid in &targets {
            if let Err(error) = self.processes.signal(*pid, Signal::Terminate) {
                warn!(pid, error = %error, "SIGTERM failed");
            }
        }

        tokio::time::sleep(self.config.grace()).await;

        let survivors: Vec<u32> = targets
            .iter()
            .copied()
            .filter(|pid| self.processes.is_alive(*pid))
            .collect();
        if !survivors.is_empty() {
            warn!(count = survivors.len(), "Processes survived SIGTERM, killing");
            self.kill_all(&survivors);
        }
        targets.len()
    }

    /// Confirm `port` accepts no connections, reclaiming between attempts.
    ///
    /// Advisory: `false` only after every attempt found it occupied.
    pub async fn verify_free(&self, port: u16) -> bool {
        let attempts = self.config.attempts.max(1);
        for attempt in 1..=attempts {
            if !self.ports.is_occupied(port).await {
                return true;
            }
            warn!(port, attempt, attempts, "Port still occupied");
            if attempt < attempts {
                self.reclaim_port(port).await;
            }
        }
        false
    }

    async fn lookup(&self, view: &'static str, port: u16, connections: bool) -> BTreeSet<u32> {
        let result = if connections {
            self.processes.connection_owners(port).await
        } else {
            self.processes.socket_owners(port).await
        };
        match result {
            Ok(pids) => pids.into_iter().collect(),
            Err(error) => {
                warn!(port, view, error = %error, "Port owner lookup failed");
                BTreeSet::new()
            }
        }
    }

    fn kill_all<'a>(&self, pids: impl IntoIterator<Item = &'a u32>) {
        for pid in pids {
            if *pid == self.self_pid {
                continue;
            }
            if let Err(error) = self.processes.signal(*pid, Signal::Kill) {
                warn!(pid, error = %error, "SIGKILL failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::host::MockHost;

    fn fast() -> ReclaimConfig {
        ReclaimConfig {
            attempts: 3,
            settle_ms: 0,
            grace_secs: 0,
        }
    }

    #[tokio::test]
    async fn stubborn_process_is_killed_after_grace() {
        let host = MockHost::new()
            .with_process(10, "ollama serve")
            .with_stubborn_process(11, "ollama serve")
            .with_process(12, "bash");
        let reclaimer = Reclaimer::new(host.processes(), host.ports(), fast(), 1);

        assert_eq!(reclaimer.reclaim_processes("ollama serve").await, 2);
        assert!(!host.is_alive(10));
        assert!(!host.is_alive(11));
        assert!(host.is_alive(12));
        assert!(host.signals().contains(&(11, Signal::Kill)));
    }

    #[tokio::test]
    async fn own_process_is_never_signalled() {
        let host = MockHost::new()
            .with_process(1, "stackwarden run ollama serve")
            .with_process(20, "ollama serve");
        let reclaimer = Reclaimer::new(host.processes(), host.ports(), fast(), 1);

        reclaimer.reclaim_processes("ollama serve").await;
        assert!(host.is_alive(1));
        assert!(host.signals().iter().all(|(pid, _)| *pid != 1));
    }
}
