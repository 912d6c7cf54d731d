use crate::events::ProducerMeta;
use thiserror::Error;
use tokio::sync::mpsc;

/// Returned when the responder's fan-out task is no longer running.
///
/// Carries the message back so the caller can decide what to do with it.
#[derive(Debug, Error)]
#[error("broadcast input for producer `{producer}` is closed")]
pub struct ResponderClosed<M> {
    pub producer: String,
    pub message: M,
}

/// Per-producer handle feeding the broadcaster.
///
/// Dropping the responder closes its input, which ends its fan-out task.
#[derive(Debug)]
pub struct Responder<M> {
    meta: ProducerMeta,
    input: mpsc::Sender<M>,
}

impl<M> Responder<M> {
    pub(super) fn new(meta: ProducerMeta, input: mpsc::Sender<M>) -> Self {
        Self { meta, input }
    }

    pub fn meta(&self) -> &ProducerMeta {
        &self.meta
    }

    /// Push a message into the broadcast input.
    ///
    /// Waits only for the fan-out task to take the previous message, never for
    /// consumers.
    pub async fn send(&self, message: M) -> Result<(), ResponderClosed<M>> {
        self.input
            .send(message)
            .await
            .map_err(|mpsc::error::SendError(message)| ResponderClosed {
                producer: self.meta.name.clone(),
                message,
            })
    }

    /// Whether the fan-out task has exited.
    pub fn is_closed(&self) -> bool {
        self.input.is_closed()
    }
}
