pub mod flow;
pub mod hunt;
pub mod ingest;
pub mod participation;
pub mod pool;

pub use flow::{FlowId, FlowRequest, LaunchFlowResponse};
pub use hunt::{HuntRecord, HuntState, HuntStats};
pub use ingest::IngestResponse;
pub use participation::{DecodeError, ParticipationEvent};
pub use pool::PoolMessage;

/// A structured result row as produced by a monitoring query.
pub type Row = serde_json::Map<String, serde_json::Value>;
