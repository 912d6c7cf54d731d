//! In-process event source fed by [`IngestSource::publish`].
//!
//! Every `watch` registers its own bounded channel under the artifact, so rows
//! published before a subscription are not replayed. Delivery is lossless: a
//! full subscriber holds `publish` back until it has room.

use super::{CompiledQuery, EventSource, MonitoringQuery, SourceError};
use crate::events::{Row, RowStream, DEFAULT_CHANNEL_BUFFER};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

type Subscribers = Mutex<Vec<mpsc::Sender<Row>>>;

pub struct IngestSource {
    capacity: usize,
    artifacts: HashMap<String, Subscribers>,
}

impl IngestSource {
    /// Create a source serving `artifacts`, each buffering up to `capacity`
    /// rows per subscriber.
    pub fn new(artifacts: impl IntoIterator<Item = impl Into<String>>, capacity: usize) -> Self {
        let artifacts = artifacts
            .into_iter()
            .map(|name| (name.into(), Mutex::new(Vec::new())))
            .collect();
        Self {
            capacity: capacity.max(1),
            artifacts,
        }
    }

    pub fn with_default_capacity(artifacts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(artifacts, DEFAULT_CHANNEL_BUFFER)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    /// Publish a row for `artifact`, returning how many subscriptions took it.
    ///
    /// Waits while any live subscriber's buffer is full. Subscriptions whose
    /// stream was dropped are removed.
    pub async fn publish(&self, artifact: &str, row: Row) -> Result<usize, SourceError> {
        let subscribers = self
            .artifacts
            .get(artifact)
            .ok_or_else(|| SourceError::UnknownArtifact(artifact.to_string()))?;
        let senders = lock(subscribers).clone();

        let mut delivered = 0;
        let mut closed = 0;
        for sender in &senders {
            match sender.send(row.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => closed += 1,
            }
        }

        if closed > 0 {
            lock(subscribers).retain(|sender| !sender.is_closed());
            debug!(%artifact, closed, "Dropped closed monitoring subscriptions");
        }
        Ok(delivered)
    }
}

fn lock(subscribers: &Subscribers) -> MutexGuard<'_, Vec<mpsc::Sender<Row>>> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventSource for IngestSource {
    fn compile(&self, query: &MonitoringQuery) -> Result<CompiledQuery, SourceError> {
        if !self.artifacts.contains_key(&query.artifact) {
            return Err(SourceError::UnknownArtifact(query.artifact.clone()));
        }
        Ok(CompiledQuery::new(query.clone()))
    }

    fn watch(&self, query: &CompiledQuery) -> RowStream {
        let Some(subscribers) = self.artifacts.get(query.artifact()) else {
            return Box::pin(tokio_stream::empty::<Row>());
        };

        let (tx, rx) = mpsc::channel(self.capacity);
        lock(subscribers).push(tx);

        let query = query.clone();
        Box::pin(ReceiverStream::new(rx).map(move |row| query.project(row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PARTICIPATION_ARTIFACT;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[tokio::test]
    async fn test_compile_rejects_unknown_artifact() {
        let source = IngestSource::with_default_capacity([PARTICIPATION_ARTIFACT]);
        assert!(source.compile(&MonitoringQuery::participation()).is_ok());
        assert_eq!(
            source.compile(&MonitoringQuery::all("Nope")),
            Err(SourceError::UnknownArtifact("Nope".into()))
        );
        assert!(source.publish("Nope", Row::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_watch_streams_projected_rows() {
        let source = IngestSource::with_default_capacity([PARTICIPATION_ARTIFACT]);
        let compiled = source.compile(&MonitoringQuery::participation()).unwrap();

        // Nothing is buffered before the first subscription.
        assert_eq!(
            source.publish(PARTICIPATION_ARTIFACT, Row::new()).await.unwrap(),
            0
        );

        let mut first = source.watch(&compiled);
        let mut second = source.watch(&compiled);
        let delivered = source
            .publish(
                PARTICIPATION_ARTIFACT,
                row(json!({"HuntId": "H.1", "ClientId": "C.1", "Participate": true, "Extra": 1})),
            )
            .await
            .unwrap();
        assert_eq!(delivered, 2);

        for stream in [&mut first, &mut second] {
            let got = tokio::time::timeout(Duration::from_secs(1), stream.next())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got.get("HuntId"), Some(&json!("H.1")));
            assert!(got.get("Extra").is_none());
        }
    }

    #[tokio::test]
    async fn test_full_subscriber_holds_publisher_back() {
        let source = Arc::new(IngestSource::new(["Custom.Events"], 2));
        let compiled = source.compile(&MonitoringQuery::all("Custom.Events")).unwrap();
        let mut stream = source.watch(&compiled);

        let publisher = {
            let source = Arc::clone(&source);
            tokio::spawn(async move {
                for i in 0..5 {
                    let delivered = source
                        .publish("Custom.Events", row(json!({ "n": i })))
                        .await
                        .unwrap();
                    assert_eq!(delivered, 1);
                }
            })
        };

        // Two rows fit in the buffer; the third publish waits for the reader.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!publisher.is_finished());

        for i in 0..5 {
            let got = tokio::time::timeout(Duration::from_secs(1), stream.next())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got.get("n"), Some(&json!(i)));
        }
        tokio::time::timeout(Duration::from_secs(1), publisher)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_removed() {
        let source = IngestSource::new(["Custom.Events"], 1);
        let compiled = source.compile(&MonitoringQuery::all("Custom.Events")).unwrap();
        let kept = source.watch(&compiled);
        drop(source.watch(&compiled));

        let delivered = source
            .publish("Custom.Events", row(json!({ "n": 0 })))
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(lock(&source.artifacts["Custom.Events"]).len(), 1);
        drop(kept);
    }
}
