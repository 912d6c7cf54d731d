//! Feeds monitoring artifacts into the pool broadcaster.
//!
//! Each broadcast artifact gets its own producer and task. A task ends when
//! shutdown fires, when its row stream ends, or when the broadcaster stops
//! taking its messages.

use hunter_core::broadcast::{EventBroadcaster, Responder};
use hunter_core::events::{
    PoolMessage, ProducerMeta, RowStream, ShutdownReceiver, shutdown_requested,
};
use hunter_core::source::{EventSource, MonitoringQuery, SourceError};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Start one feed task per artifact.
///
/// Every artifact is compiled before any task is spawned, so an unknown
/// artifact leaves nothing running.
pub fn spawn_pool_feeds<Src: EventSource>(
    source: &Src,
    broadcaster: &EventBroadcaster<PoolMessage>,
    artifacts: &[String],
    shutdown_rx: &ShutdownReceiver,
) -> Result<Vec<JoinHandle<()>>, SourceError> {
    let compiled = artifacts
        .iter()
        .map(|artifact| source.compile(&MonitoringQuery::all(artifact.as_str())))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(compiled
        .iter()
        .map(|query| {
            let rows = source.watch(query);
            let responder = broadcaster.new_producer(ProducerMeta::new(query.artifact()));
            tokio::spawn(feed_loop(responder, rows, shutdown_rx.clone()))
        })
        .collect())
}

async fn feed_loop(
    responder: Responder<PoolMessage>,
    mut rows: RowStream,
    shutdown_rx: ShutdownReceiver,
) {
    let artifact = responder.meta().name.clone();
    info!(%artifact, "Pool feed started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown_requested(shutdown_rx.clone()) => {
                debug!(%artifact, "Pool feed received shutdown signal");
                break;
            }

            row = rows.next() => {
                let Some(row) = row else {
                    info!(%artifact, "Pool feed stream ended");
                    break;
                };
                let message = PoolMessage {
                    source: artifact.clone(),
                    row,
                };
                if let Err(e) = responder.send(message).await {
                    warn!(error = %e, "Pool feed stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hunter_core::broadcast::{BroadcasterCell, consumer_channel};
    use hunter_core::events::{Row, shutdown_channel};
    use hunter_core::source::IngestSource;
    use std::time::Duration;

    const STATS: &str = "Generic.Client.Stats";

    #[tokio::test]
    async fn test_rows_reach_pool_consumers() {
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let cell = BroadcasterCell::<PoolMessage>::new();
        let broadcaster = cell.get_or_create(&shutdown_rx);
        let source = IngestSource::with_default_capacity([STATS]);

        let (sink, mut rx) = consumer_channel(8);
        let _lease = broadcaster.register_consumer(1, sink);

        let handles =
            spawn_pool_feeds(&source, &broadcaster, &[STATS.to_string()], &shutdown_rx).unwrap();
        assert_eq!(handles.len(), 1);

        let mut row = Row::new();
        row.insert("ClientId".into(), "C.1".into());
        source.publish(STATS, row.clone()).await.unwrap();

        let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.source, STATS);
        assert_eq!(message.row, row);

        shutdown_tx.send_replace(true);
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_unknown_artifact_spawns_nothing() {
        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        let broadcaster = BroadcasterCell::<PoolMessage>::new().get_or_create(&shutdown_rx);
        let source = IngestSource::with_default_capacity([STATS]);

        let err = spawn_pool_feeds(
            &source,
            &broadcaster,
            &[STATS.to_string(), "Missing".to_string()],
            &shutdown_rx,
        )
        .unwrap_err();
        assert_eq!(err, SourceError::UnknownArtifact("Missing".into()));
    }
}
