//! ParticipationProcessor.
//!
//! The ParticipationProcessor handles one `System.Hunt.Participation` row:
//! - Decoding it into a `ParticipationEvent`
//! - Ignoring clients that decline the hunt
//! - Opening the hunt's output writer
//! - Scheduling the client through the hunt registry
//! - Launching the flow and recording it in the hunt's results
//!
//! Every failure is logged here and returned; nothing is retried. A failed
//! launch keeps the registry's scheduled count, so it still consumes one slot
//! of the hunt's client limit.

use crate::events::{shutdown_requested, ParticipationEvent, Row, ShutdownReceiver};
use crate::launcher::{FlowLauncher, TransportError};
use crate::output::OutputWriterCache;
use crate::registry::{schedule_client, EligibilityError, HuntRegistry, RegistryError};
use crate::storage::{ResultStore, StorageError};
use hunter_sdk::objects::{DecodeError, FlowId};
use kanau::processor::Processor;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

/// What happened to a row that was handled without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The client declined the hunt.
    NotParticipating { hunt_id: String, client_id: String },
    /// A flow was launched and recorded.
    Scheduled {
        hunt_id: String,
        client_id: String,
        flow_id: FlowId,
    },
}

/// Errors that can occur while handling a participation row.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("malformed participation row: {0}")]
    Decode(#[from] DecodeError),

    #[error("hunt output unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("client not eligible: {0}")]
    Eligibility(#[from] EligibilityError),

    #[error("flow launch failed: {0}")]
    Transport(#[from] TransportError),

    #[error("cancelled during flow launch")]
    Cancelled,
}

/// Turns participation rows into scheduled flows.
pub struct ParticipationProcessor<R, L, S: ResultStore> {
    registry: Arc<R>,
    launcher: Arc<L>,
    writers: Arc<OutputWriterCache<S>>,
    cancel_rx: ShutdownReceiver,
}

impl<R, L, S> ParticipationProcessor<R, L, S>
where
    R: HuntRegistry,
    L: FlowLauncher,
    S: ResultStore,
{
    /// Create a new ParticipationProcessor.
    ///
    /// # Arguments
    ///
    /// * `registry` - Hunt registry applying scheduling transitions
    /// * `launcher` - Client used to launch flows
    /// * `writers` - Per-hunt output writers
    /// * `cancel_rx` - Aborts an in-flight launch when signalled
    pub fn new(
        registry: Arc<R>,
        launcher: Arc<L>,
        writers: Arc<OutputWriterCache<S>>,
        cancel_rx: ShutdownReceiver,
    ) -> Self {
        Self {
            registry,
            launcher,
            writers,
            cancel_rx,
        }
    }

    /// Handle one row, logging any failure.
    pub async fn handle_row(&self, row: Row) -> Result<RowOutcome, ProcessError> {
        let event = match ParticipationEvent::decode(&row) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed participation row");
                return Err(e.into());
            }
        };

        let result = self.schedule(&event).await;
        if let Err(e) = &result {
            log_failure(&event, e);
        }
        result
    }

    async fn schedule(&self, event: &ParticipationEvent) -> Result<RowOutcome, ProcessError> {
        if !event.participate {
            return Ok(RowOutcome::NotParticipating {
                hunt_id: event.hunt_id.clone(),
                client_id: event.client_id.clone(),
            });
        }

        let writer = self.writers.get_or_create(&event.hunt_id).await?;

        let now = OffsetDateTime::now_utc();
        let client_id = event.client_id.clone();
        let request = self
            .registry
            .modify_hunt(&event.hunt_id, move |record| {
                schedule_client(record, &client_id, now)
            })
            .await??;

        let flow_id = tokio::select! {
            biased;

            _ = shutdown_requested(self.cancel_rx.clone()) => {
                return Err(ProcessError::Cancelled);
            }

            launched = self.launcher.launch_flow(request) => launched?,
        };

        let annotated = event.with_flow_id(flow_id.clone());
        writer.lock().await.write(&annotated).await?;

        info!(
            hunt_id = %event.hunt_id,
            client_id = %event.client_id,
            flow_id = %flow_id,
            "Scheduled hunt flow on client"
        );

        Ok(RowOutcome::Scheduled {
            hunt_id: event.hunt_id.clone(),
            client_id: event.client_id.clone(),
            flow_id,
        })
    }
}

fn log_failure(event: &ParticipationEvent, e: &ProcessError) {
    let hunt_id = event.hunt_id.as_str();
    let client_id = event.client_id.as_str();
    match e {
        ProcessError::Eligibility(_) | ProcessError::Cancelled => {
            info!(hunt_id, client_id, error = %e, "Client not scheduled");
        }
        ProcessError::Transport(_) => {
            error!(hunt_id, client_id, error = %e, "Failed to launch hunt flow");
        }
        ProcessError::Decode(_) | ProcessError::Storage(_) | ProcessError::Registry(_) => {
            warn!(hunt_id, client_id, error = %e, "Failed to process participation");
        }
    }
}

// ---------------------------------------------------------------------------
// Processor trait implementation
// ---------------------------------------------------------------------------

impl<R, L, S> Processor<Row> for ParticipationProcessor<R, L, S>
where
    R: HuntRegistry,
    L: FlowLauncher,
    S: ResultStore,
{
    type Output = RowOutcome;
    type Error = ProcessError;

    async fn process(&self, row: Row) -> Result<RowOutcome, ProcessError> {
        self.handle_row(row).await
    }
}
