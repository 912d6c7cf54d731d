//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /monitoring/{artifact}` – publish monitoring rows
//! - `GET  /hunts`                 – list hunts
//! - `GET  /hunts/{hunt_id}`       – show one hunt
//! - `PUT  /hunts/{hunt_id}`       – create or replace a hunt
//! - `GET  /pool/ws?id=<u64>`      – pool client websocket

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::state::AppState;

mod hunts;
mod monitoring;
mod pool;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/monitoring/{artifact}", post(monitoring::publish_rows))
        .route("/hunts", get(hunts::list_hunts))
        .route("/hunts/{hunt_id}", get(hunts::get_hunt).put(hunts::put_hunt))
        .route("/pool/ws", get(pool::pool_ws))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    UnknownArtifact(String),
    HuntNotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::UnknownArtifact(artifact) => {
                tracing::debug!(%artifact, "Rejected rows for unknown artifact");
                (StatusCode::NOT_FOUND, format!("unknown artifact: {artifact}")).into_response()
            }
            ApiError::HuntNotFound(hunt_id) => {
                (StatusCode::NOT_FOUND, format!("hunt not found: {hunt_id}")).into_response()
            }
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
        }
    }
}
