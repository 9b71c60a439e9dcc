//! Shutdown signalling shared by the long-running tasks
//!
//! Shutdown is a `watch::channel(bool)`; `true` means stop. A dropped
//! sender counts as a shutdown request.

use std::time::Duration;
use tokio::sync::watch;

pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub fn is_requested(shutdown_rx: &watch::Receiver<bool>) -> bool {
    *shutdown_rx.borrow()
}

/// Resolve once shutdown has been requested
pub async fn requested(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `delay` unless shutdown arrives first
///
/// Returns true if the sleep completed, false if shutdown was requested.
pub async fn interruptible_sleep(shutdown_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = requested(shutdown_rx) => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interruptible_sleep_completes() {
        let (_shutdown_tx, mut shutdown_rx) = channel();
        assert!(interruptible_sleep(&mut shutdown_rx, Duration::from_millis(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interruptible_sleep_interrupted() {
        let (shutdown_tx, mut shutdown_rx) = channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = shutdown_tx.send(true);
        });

        let started = tokio::time::Instant::now();
        assert!(!interruptible_sleep(&mut shutdown_rx, Duration::from_secs(60)).await);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_already_requested_returns_immediately() {
        let (shutdown_tx, mut shutdown_rx) = channel();
        shutdown_tx.send(true).unwrap();

        assert!(is_requested(&shutdown_rx));
        assert!(!interruptible_sleep(&mut shutdown_rx, Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_shutdown() {
        let (shutdown_tx, mut shutdown_rx) = channel();
        drop(shutdown_tx);

        assert!(!interruptible_sleep(&mut shutdown_rx, Duration::from_secs(3600)).await);
    }
}
