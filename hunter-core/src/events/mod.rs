//! Event plumbing shared by the orchestrator and the broadcaster.
//!
//! # Event Flow
//!
//! 1. An `EventSource` yields monitoring rows as a `RowStream`
//! 2. `HuntOrchestrator` consumes `System.Hunt.Participation` rows
//! 3. A `Responder` forwards rows into the `EventBroadcaster`
//! 4. `EventBroadcaster` duplicates each message to every pool consumer
//!
//! Every long-running loop observes the same shutdown channel.

pub mod channels;
pub mod types;

pub use channels::{
    shutdown_channel, shutdown_requested, RowStream, ShutdownReceiver, ShutdownSender,
    DEFAULT_CHANNEL_BUFFER,
};

pub use types::{ParticipationEvent, PoolMessage, ProducerMeta, Row};
