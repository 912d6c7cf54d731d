//! Application state shared across all request handlers.

use hunter_core::broadcast::EventBroadcaster;
use hunter_core::events::{PoolMessage, ShutdownReceiver};
use hunter_core::registry::InMemoryHuntRegistry;
use hunter_core::source::IngestSource;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Ingest side of the monitoring event source.
    pub source: Arc<IngestSource>,
    /// Hunts known to this daemon.
    pub registry: Arc<InMemoryHuntRegistry>,
    /// Pool broadcaster that websocket clients register with.
    pub broadcaster: EventBroadcaster<PoolMessage>,
    /// Queue depth for each pool client.
    pub consumer_buffer: usize,
    /// Fires once when the daemon begins shutting down.
    pub shutdown_rx: ShutdownReceiver,
}
