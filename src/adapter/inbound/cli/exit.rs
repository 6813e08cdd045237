//! Process exit codes.

/// Phase sequence completed; degraded outcomes allowed.
pub const OK: u8 = 0;
/// Setup error: configuration, privileges, driver wiring.
pub const SETUP: u8 = 1;
/// Another live run holds the lock under the `fail` policy.
pub const LOCKED: u8 = 2;
/// Completed with degraded or failed phases under `--strict`.
pub const DEGRADED: u8 = 3;
/// Cancelled by a signal.
pub const CANCELLED: u8 = 130;
