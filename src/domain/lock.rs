//! On-disk run lock record.

/// Single-line lock file content: the owner's process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRecord {
    pub owner_pid: u32,
}

impl LockRecord {
    #[must_use]
    pub const fn new(owner_pid: u32) -> Self {
        Self { owner_pid }
    }

    /// Parse file content. Garbage yields `None` and is treated as stale.
    #[must_use]
    pub fn parse(content: &str) -> Option<Self> {
        content
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|pid| *pid != 0)
            .map(Self::new)
    }

    #[must_use]
    pub fn render(&self) -> String {
        format!("{}\n", self.owner_pid)
    }
}
