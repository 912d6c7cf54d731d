//! Channel factories and handles.
//!
//! Shutdown is a `watch<bool>` channel created once at process start and
//! cloned into every loop, mirroring a top-down cancellation tree.

use super::types::Row;
use std::pin::Pin;
use tokio::sync::watch;
use tokio_stream::Stream;

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender half of the shutdown signal.
pub type ShutdownSender = watch::Sender<bool>;
/// Receiver half of the shutdown signal.
pub type ShutdownReceiver = watch::Receiver<bool>;

/// A lazy, cancellable sequence of monitoring rows. Dropping it cancels the
/// underlying subscription.
pub type RowStream = Pin<Box<dyn Stream<Item = Row> + Send>>;

/// Create a new shutdown channel, initially not signalled.
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}

/// Resolve once shutdown has been signalled on `rx`.
///
/// If the sender is dropped without ever signalling, this never resolves.
pub async fn shutdown_requested(mut rx: ShutdownReceiver) {
    if rx.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_requested_resolves_after_signal() {
        let (tx, rx) = shutdown_channel();
        let waiter = tokio::spawn(shutdown_requested(rx));
        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_requested_pending_when_sender_dropped() {
        let (tx, rx) = shutdown_channel();
        drop(tx);
        let result = tokio::time::timeout(Duration::from_millis(50), shutdown_requested(rx)).await;
        assert!(result.is_err());
    }
}
