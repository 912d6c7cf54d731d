//! Signal handling for graceful shutdown.

use hunter_core::events::ShutdownSender;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Waits for a shutdown signal, then broadcasts it to every background loop.
///
/// Used as the HTTP server's graceful-shutdown future so the server and the
/// loops stop together.
pub async fn broadcast_on_signal(shutdown_tx: Arc<ShutdownSender>) {
    shutdown_signal().await;
    shutdown_tx.send_replace(true);
}
