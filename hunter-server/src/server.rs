//! Axum server setup and router configuration.

use crate::shutdown::broadcast_on_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use hunter_core::events::ShutdownSender;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(crate::api::router())
        // Add state to all routes
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
///
/// A SIGTERM/SIGINT both stops accepting requests and fires `shutdown_tx`,
/// which ends the background loops and open pool connections.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown_tx: Arc<ShutdownSender>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(broadcast_on_signal(shutdown_tx))
        .await
}
