//! Shutdown signal helpers.
//!
//! Every long-running loop receives a `watch::Receiver<bool>`; `true` means
//! stop. A dropped sender is treated the same as `true`.

use tokio::sync::watch;

/// Shutdown signal receiver.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Creates a fresh signal pair, initially not set.
#[must_use]
pub fn channel() -> (watch::Sender<bool>, ShutdownSignal) {
    watch::channel(false)
}

/// Returns `true` if shutdown has been requested.
#[must_use]
pub fn is_requested(rx: &ShutdownSignal) -> bool {
    *rx.borrow()
}

/// Completes once shutdown is requested or the sender is dropped.
pub async fn requested(rx: &mut ShutdownSignal) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
