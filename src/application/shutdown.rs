//! Cooperative cancellation shared by every abortable phase.

use std::time::Duration;

use tokio::sync::watch;

/// Receiving side of the run's shutdown flag.
///
/// The flag only ever moves from `false` to `true`. A dropped sender means
/// shutdown can no longer be requested.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    #[must_use]
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// A signal that is never raised.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn requested(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration`; returns `true` if shutdown cut the sleep short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut signal = self.clone();
        tokio::select! {
            () = tokio::time::sleep(duration) => false,
            () = signal.requested() => true,
        }
    }
}
