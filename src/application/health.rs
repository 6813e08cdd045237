//! Bounded readiness polling.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::port::outbound::HttpProbe;

/// Result of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Readiness {
    Ready { attempts: u32 },
    Timeout { attempts: u32 },
}

impl Readiness {
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Poll `url` up to `max_attempts` times, `interval` apart.
///
/// Never retries beyond the window; there is no sleep after the last attempt.
pub async fn wait_ready(
    probe: &dyn HttpProbe,
    url: &str,
    max_attempts: u32,
    interval: Duration,
) -> Readiness {
    let max_attempts = max_attempts.max(1);
    for attempt in 1..=max_attempts {
        if probe.is_live(url).await {
            info!(url, attempt, "Endpoint ready");
            return Readiness::Ready { attempts: attempt };
        }
        debug!(url, attempt, max_attempts, "Endpoint not ready");
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    warn!(url, attempts = max_attempts, "Endpoint did not become ready");
    Readiness::Timeout {
        attempts: max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::probe::ScriptedHttpProbe;

    #[tokio::test]
    async fn ready_on_third_attempt() {
        let probe = ScriptedHttpProbe::new().with_sequence("http://x/", [false, false, true]);
        let result = wait_ready(&probe, "http://x/", 5, Duration::ZERO).await;
        assert_eq!(result, Readiness::Ready { attempts: 3 });
        assert_eq!(probe.calls("http://x/"), 3);
    }

    #[tokio::test]
    async fn never_probes_beyond_window() {
        let probe = ScriptedHttpProbe::new();
        let result = wait_ready(&probe, "http://x/", 4, Duration::ZERO).await;
        assert_eq!(result, Readiness::Timeout { attempts: 4 });
        assert_eq!(probe.calls("http://x/"), 4);
    }
}
