//! Flow dispatch contract.
//!
//! Launching a flow hands a concrete [`FlowRequest`] to the remote execution
//! service. Deadlines are the launcher's concern; the orchestrator adds none.

use hunter_sdk::objects::{FlowId, FlowRequest};
use std::future::Future;
use thiserror::Error;

/// Failure to dispatch a flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("flow service unreachable: {0}")]
    Unreachable(String),

    #[error("flow service rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid response from flow service: {0}")]
    InvalidResponse(String),
}

pub trait FlowLauncher: Send + Sync + 'static {
    fn launch_flow(
        &self,
        request: FlowRequest,
    ) -> impl Future<Output = Result<FlowId, TransportError>> + Send;
}
