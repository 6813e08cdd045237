//! In-memory host: process table, port owners and signal log.
//!
//! Processes die on `Kill`, and on `Terminate` unless registered as
//! stubborn. A dead process disappears from every port it held.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::Result;
use crate::port::outbound::{PortProbe, ProcessTable, Signal};

#[derive(Debug, Default)]
struct HostState {
    processes: BTreeMap<u32, String>,
    stubborn: BTreeSet<u32>,
    listeners: BTreeMap<u16, BTreeSet<u32>>,
    clients: BTreeMap<u16, BTreeSet<u32>>,
    pinned_ports: BTreeSet<u16>,
    signals: Vec<(u32, Signal)>,
    port_kills: Vec<u16>,
}

impl HostState {
    fn kill(&mut self, pid: u32) {
        self.processes.remove(&pid);
        for owners in self.listeners.values_mut().chain(self.clients.values_mut()) {
            owners.remove(&pid);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_process(self, pid: u32, cmdline: &str) -> Self {
        self.add_process(pid, cmdline);
        self
    }

    /// A process that ignores `SIGTERM`.
    pub fn with_stubborn_process(self, pid: u32, cmdline: &str) -> Self {
        self.add_process(pid, cmdline);
        self.lock().stubborn.insert(pid);
        self
    }

    /// A live process with no interesting command line.
    pub fn with_alive(self, pid: u32) -> Self {
        self.with_process(pid, "")
    }

    /// `pid` listens on `port`.
    pub fn with_listener(self, port: u16, pid: u32) -> Self {
        {
            let mut state = self.lock();
            state.processes.entry(pid).or_default();
            state.listeners.entry(port).or_default().insert(pid);
        }
        self
    }

    /// `pid` holds a client connection to `port`.
    pub fn with_client(self, port: u16, pid: u32) -> Self {
        {
            let mut state = self.lock();
            state.processes.entry(pid).or_default();
            state.clients.entry(port).or_default().insert(pid);
        }
        self
    }

    /// `port` stays occupied whatever is killed.
    pub fn with_pinned_port(self, port: u16) -> Self {
        self.lock().pinned_ports.insert(port);
        self
    }

    pub fn add_process(&self, pid: u32, cmdline: &str) {
        self.lock().processes.insert(pid, cmdline.to_string());
    }

    pub fn is_alive(&self, pid: u32) -> bool {
        self.lock().processes.contains_key(&pid)
    }

    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.lock().signals.clone()
    }

    /// Ports passed to the signal-based port-owner kill.
    pub fn port_kills(&self) -> Vec<u16> {
        self.lock().port_kills.clone()
    }

    pub fn processes(&self) -> Arc<dyn ProcessTable> {
        Arc::new(self.clone())
    }

    pub fn ports(&self) -> Arc<dyn PortProbe> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl ProcessTable for MockHost {
    fn is_alive(&self, pid: u32) -> bool {
        Self::is_alive(self, pid)
    }

    fn find(&self, pattern: &str) -> Vec<u32> {
        self.lock()
            .processes
            .iter()
            .filter(|(_, cmdline)| cmdline.contains(pattern))
            .map(|(pid, _)| *pid)
            .collect()
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<()> {
        let mut state = self.lock();
        state.signals.push((pid, signal));
        if signal == Signal::Kill || !state.stubborn.contains(&pid) {
            state.kill(pid);
        }
        Ok(())
    }

    async fn kill_port_owner(&self, port: u16) -> Result<()> {
        let mut state = self.lock();
        state.port_kills.push(port);
        let owners: Vec<u32> = state
            .listeners
            .get(&port)
            .into_iter()
            .chain(state.clients.get(&port))
            .flatten()
            .copied()
            .collect();
        for pid in owners {
            state.signals.push((pid, Signal::Kill));
            state.kill(pid);
        }
        Ok(())
    }

    async fn connection_owners(&self, port: u16) -> Result<Vec<u32>> {
        let state = self.lock();
        let owners: BTreeSet<u32> = state
            .listeners
            .get(&port)
            .into_iter()
            .chain(state.clients.get(&port))
            .flatten()
            .copied()
            .collect();
        Ok(owners.into_iter().collect())
    }

    async fn socket_owners(&self, port: u16) -> Result<Vec<u32>> {
        Ok(self
            .lock()
            .listeners
            .get(&port)
            .map(|owners| owners.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl PortProbe for MockHost {
    async fn is_occupied(&self, port: u16) -> bool {
        let state = self.lock();
        state.pinned_ports.contains(&port)
            || state.listeners.get(&port).is_some_and(|owners| !owners.is_empty())
    }
}
