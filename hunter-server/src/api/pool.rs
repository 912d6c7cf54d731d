use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use hunter_core::broadcast::{ConsumerId, consumer_channel};
use hunter_core::events::shutdown_requested;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct PoolParams {
    id: ConsumerId,
}

/// `GET /pool/ws?id=<u64>`: pool client websocket.
///
/// Registers the connection as pool consumer `id` and streams every
/// broadcast message as a JSON text frame. A second connection with the same
/// id takes over the registration and the first stops receiving.
pub(super) async fn pool_ws(
    State(state): State<AppState>,
    Query(params): Query<PoolParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_pool_ws(socket, state, params.id))
}

/// Drives one pool connection until either side closes or shutdown fires.
async fn handle_pool_ws(socket: WebSocket, state: AppState, id: ConsumerId) {
    let (sink, mut messages) = consumer_channel(state.consumer_buffer);
    // Dropping the lease at the end unregisters this connection.
    let _lease = state.broadcaster.register_consumer(id, sink);
    tracing::info!(consumer_id = id, "Pool client connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            _ = shutdown_requested(state.shutdown_rx.clone()) => {
                break;
            }

            message = messages.recv() => {
                // Closed once a newer connection replaced this registration.
                let Some(message) = message else {
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, consumer_id = id, "Failed to encode pool message");
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    tracing::debug!(consumer_id = id, "Pool client went away");
                    return;
                }
            }

            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        tracing::info!(consumer_id = id, "Pool client disconnected");
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    tracing::info!(consumer_id = id, "Pool client closed by server");
}
