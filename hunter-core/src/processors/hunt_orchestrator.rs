//! HuntOrchestrator.
//!
//! The HuntOrchestrator is responsible for:
//! - Compiling the participation query against the event source
//! - Running a single background task that feeds rows, one at a time and in
//!   arrival order, to a `ParticipationProcessor`
//! - Stopping that task on shutdown and closing every hunt output writer
//!
//! The loop stops when the parent shutdown signal fires, when
//! [`close()`](HuntOrchestrator::close) is called, or when the row stream
//! ends. A row being processed when shutdown fires is finished unless it is
//! waiting on a flow launch, which is abandoned.

use super::participation::ParticipationProcessor;
use crate::events::{shutdown_requested, RowStream, ShutdownReceiver, ShutdownSender};
use crate::launcher::FlowLauncher;
use crate::output::{OutputWriterCache, DEFAULT_RESULT_EXTENSION};
use crate::registry::HuntRegistry;
use crate::source::{EventSource, MonitoringQuery, SourceError};
use crate::storage::ResultStore;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Errors that prevent the orchestrator from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to compile participation query: {0}")]
    Source(#[from] SourceError),

    #[error("hunt orchestrator already started")]
    AlreadyStarted,
}

/// Configuration for the HuntOrchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Query producing participation rows.
    pub query: MonitoringQuery,
    /// Extension of per-hunt result files.
    pub result_extension: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            query: MonitoringQuery::participation(),
            result_extension: DEFAULT_RESULT_EXTENSION.to_string(),
        }
    }
}

/// Drives hunt scheduling from the participation event stream.
pub struct HuntOrchestrator<Src, R, L, S: ResultStore> {
    source: Arc<Src>,
    processor: Arc<ParticipationProcessor<R, L, S>>,
    writers: Arc<OutputWriterCache<S>>,
    query: MonitoringQuery,
    shutdown_rx: ShutdownReceiver,
    stop_tx: Arc<ShutdownSender>,
    task: Option<JoinHandle<()>>,
    relay: Option<JoinHandle<()>>,
    closed: bool,
}

impl<Src, R, L, S> HuntOrchestrator<Src, R, L, S>
where
    Src: EventSource,
    R: HuntRegistry,
    L: FlowLauncher,
    S: ResultStore,
{
    /// Create a new HuntOrchestrator.
    ///
    /// # Arguments
    ///
    /// * `source` - Event source serving the participation artifact
    /// * `registry` - Hunt registry
    /// * `launcher` - Flow launch client
    /// * `store` - Backing store for per-hunt result files
    /// * `config` - Query and result file settings
    /// * `shutdown_rx` - Receiver for the process shutdown signal
    pub fn new(
        source: Arc<Src>,
        registry: Arc<R>,
        launcher: Arc<L>,
        store: S,
        config: OrchestratorConfig,
        shutdown_rx: ShutdownReceiver,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let writers = Arc::new(OutputWriterCache::new(store, config.result_extension));
        let processor = Arc::new(ParticipationProcessor::new(
            registry,
            launcher,
            Arc::clone(&writers),
            stop_rx,
        ));

        Self {
            source,
            processor,
            writers,
            query: config.query,
            shutdown_rx,
            stop_tx: Arc::new(stop_tx),
            task: None,
            relay: None,
            closed: false,
        }
    }

    /// Compile the participation query and start the processing task.
    ///
    /// On error nothing has been spawned.
    pub fn start(&mut self) -> Result<(), StartupError> {
        if self.task.is_some() || self.closed {
            return Err(StartupError::AlreadyStarted);
        }

        info!(query = %self.query, "Starting hunt orchestrator");
        let compiled = self.source.compile(&self.query)?;
        let rows = self.source.watch(&compiled);

        let processor = Arc::clone(&self.processor);
        let stop_rx = self.stop_tx.subscribe();
        self.task = Some(tokio::spawn(run_loop(processor, rows, stop_rx)));

        // Forward the parent's shutdown into our own stop channel so the
        // processor sees a single signal.
        let parent = self.shutdown_rx.clone();
        let stop_tx = Arc::clone(&self.stop_tx);
        self.relay = Some(tokio::spawn(async move {
            shutdown_requested(parent).await;
            stop_tx.send_replace(true);
        }));

        Ok(())
    }

    /// Whether the processing task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn writers(&self) -> &Arc<OutputWriterCache<S>> {
        &self.writers
    }

    /// Stop the processing task, wait for it, then close all output writers.
    ///
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        self.stop_tx.send_replace(true);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Hunt orchestrator task ended abnormally");
            }
        }
        if let Some(relay) = self.relay.take() {
            relay.abort();
        }

        self.writers.close_all().await;

        if !self.closed {
            self.closed = true;
            info!("Hunt orchestrator shutdown complete");
        }
    }
}

async fn run_loop<R, L, S>(
    processor: Arc<ParticipationProcessor<R, L, S>>,
    mut rows: RowStream,
    stop_rx: ShutdownReceiver,
) where
    R: HuntRegistry,
    L: FlowLauncher,
    S: ResultStore,
{
    info!("Hunt orchestrator started");

    loop {
        tokio::select! {
            biased;

            // Shutdown has highest priority.
            _ = shutdown_requested(stop_rx.clone()) => {
                info!("Hunt orchestrator received shutdown signal");
                break;
            }

            row = rows.next() => {
                let Some(row) = row else {
                    info!("Participation stream ended");
                    break;
                };
                debug!("Received participation row");
                // Failures are logged by the processor.
                let _ = processor.handle_row(row).await;
            }
        }
    }

    info!("Hunt orchestrator loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::shutdown_channel;
    use crate::processors::test_support::{participation_row, running_hunt, StubLauncher};
    use crate::registry::InMemoryHuntRegistry;
    use crate::source::{IngestSource, PARTICIPATION_ARTIFACT};
    use crate::storage::MemoryResultStore;
    use std::time::Duration;

    type TestOrchestrator =
        HuntOrchestrator<IngestSource, InMemoryHuntRegistry, StubLauncher, MemoryResultStore>;

    struct Fixture {
        orchestrator: TestOrchestrator,
        source: Arc<IngestSource>,
        registry: Arc<InMemoryHuntRegistry>,
        launcher: Arc<StubLauncher>,
        store: MemoryResultStore,
        shutdown_tx: ShutdownSender,
    }

    fn fixture(artifacts: &[&str], limit: u64) -> Fixture {
        fixture_with_source(IngestSource::with_default_capacity(artifacts.iter().copied()), limit)
    }

    fn fixture_with_source(source: IngestSource, limit: u64) -> Fixture {
        let source = Arc::new(source);
        let registry = Arc::new(InMemoryHuntRegistry::with_hunts([running_hunt("H.1", limit)]));
        let launcher = Arc::new(StubLauncher::default());
        let store = MemoryResultStore::new();
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let orchestrator = HuntOrchestrator::new(
            Arc::clone(&source),
            Arc::clone(&registry),
            Arc::clone(&launcher),
            store.clone(),
            OrchestratorConfig::default(),
            shutdown_rx,
        );
        Fixture {
            orchestrator,
            source,
            registry,
            launcher,
            store,
            shutdown_tx,
        }
    }

    async fn wait_for_stopped(registry: &InMemoryHuntRegistry, hunt_id: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if registry.get_hunt(hunt_id).await.is_some_and(|h| h.stats.stopped) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("hunt was never stopped");
    }

    #[tokio::test]
    async fn test_start_fails_without_participation_artifact() {
        let mut f = fixture(&["Other.Artifact"], 0);
        let err = f.orchestrator.start().unwrap_err();
        assert!(matches!(
            err,
            StartupError::Source(SourceError::UnknownArtifact(ref a)) if a == PARTICIPATION_ARTIFACT
        ));
        assert!(!f.orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut f = fixture(&[PARTICIPATION_ARTIFACT], 0);
        f.orchestrator.start().unwrap();
        assert!(matches!(
            f.orchestrator.start(),
            Err(StartupError::AlreadyStarted)
        ));
        f.orchestrator.close().await;
    }

    #[tokio::test]
    async fn test_rows_processed_in_order_until_limit() {
        let mut f = fixture(&[PARTICIPATION_ARTIFACT], 1);
        f.orchestrator.start().unwrap();

        for (client, participate) in [("C.0", false), ("C.1", true), ("C.2", true)] {
            f.source
                .publish(
                    PARTICIPATION_ARTIFACT,
                    participation_row("H.1", client, participate),
                )
                .await
                .unwrap();
        }

        wait_for_stopped(&f.registry, "H.1").await;
        f.orchestrator.close().await;

        let hunt = f.registry.get_hunt("H.1").await.unwrap();
        assert_eq!(hunt.stats.total_clients_scheduled, 1);

        let lines = f.store.lines("H.1.json");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"ClientId\":\"C.1\""));
        assert_eq!(f.store.close_count("H.1.json"), 1);

        let requests = f.launcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].client_id, "C.1");
    }

    #[tokio::test]
    async fn test_slow_launcher_loses_no_rows() {
        let mut f = fixture_with_source(IngestSource::new([PARTICIPATION_ARTIFACT], 2), 0);
        f.launcher.set_delay(Duration::from_millis(50));
        f.orchestrator.start().unwrap();

        let clients: Vec<String> = (0..8).map(|i| format!("C.{i}")).collect();
        for client in &clients {
            f.source
                .publish(PARTICIPATION_ARTIFACT, participation_row("H.1", client, true))
                .await
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let hunt = f.registry.get_hunt("H.1").await.unwrap();
                if hunt.stats.total_clients_scheduled == 8 {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("not every row was scheduled");
        f.orchestrator.close().await;

        let lines = f.store.lines("H.1.json");
        assert_eq!(lines.len(), 8);
        for (line, client) in lines.iter().zip(&clients) {
            assert!(line.contains(&format!("\"ClientId\":\"{client}\"")));
        }
        let launched: Vec<String> = f
            .launcher
            .requests()
            .into_iter()
            .map(|r| r.client_id)
            .collect();
        assert_eq!(launched, clients);
    }

    #[tokio::test]
    async fn test_parent_shutdown_stops_loop() {
        let mut f = fixture(&[PARTICIPATION_ARTIFACT], 0);
        f.orchestrator.start().unwrap();
        assert!(f.orchestrator.is_running());

        f.shutdown_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), async {
            while f.orchestrator.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop kept running after shutdown");

        f.orchestrator.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_closes_writers_once() {
        let mut f = fixture(&[PARTICIPATION_ARTIFACT], 0);
        f.orchestrator.start().unwrap();
        f.orchestrator.writers().get_or_create("H.1").await.unwrap();
        f.orchestrator.writers().get_or_create("H.2").await.unwrap();

        f.orchestrator.close().await;
        f.orchestrator.close().await;

        assert!(!f.orchestrator.is_running());
        assert_eq!(f.store.close_count("H.1.json"), 1);
        assert_eq!(f.store.close_count("H.2.json"), 1);
        assert!(matches!(
            f.orchestrator.start(),
            Err(StartupError::AlreadyStarted)
        ));
    }
}
