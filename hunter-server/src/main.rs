//! Hunter Server
//!
//! Schedules hunt flows on participating clients and duplicates monitoring
//! rows to pool clients.

mod api;
mod config;
mod pool_feed;
mod rpc;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{CliOverrides, ConfigLoader};
use hunter_core::broadcast::BroadcasterCell;
use hunter_core::events::{PoolMessage, shutdown_channel};
use hunter_core::processors::{HuntOrchestrator, OrchestratorConfig};
use hunter_core::registry::InMemoryHuntRegistry;
use hunter_core::source::{IngestSource, MonitoringQuery};
use hunter_core::storage::FileResultStore;
use pool_feed::spawn_pool_feeds;
use rpc::HttpFlowLauncher;
use server::{build_router, run_server};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// The process's pool broadcaster.
static POOL: BroadcasterCell<PoolMessage> = BroadcasterCell::new();

/// Hunter - hunt orchestration and pool broadcast daemon
#[derive(Parser, Debug)]
#[command(name = "hunter-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./hunter-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:8889)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the flow service base URL
    #[arg(long, env = "HUNTER_FLOW_SERVICE_URL")]
    flow_service_url: Option<Url>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting hunter-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let overrides = CliOverrides {
        listen: args.listen,
        flow_service_url: args.flow_service_url,
    };
    let config = ConfigLoader::new(&args.config, overrides)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::info!(
        hunts = config.hunts.len(),
        "Configuration loaded from {:?}",
        args.config
    );

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let shutdown_tx = Arc::new(shutdown_tx);

    let source = Arc::new(IngestSource::new(
        config.source.artifacts.iter().cloned(),
        config.source.buffer,
    ));
    let registry = Arc::new(InMemoryHuntRegistry::with_hunts(config.hunts.clone()));
    let launcher = Arc::new(HttpFlowLauncher::new(
        &config.flow_service.url,
        Duration::from_secs(config.flow_service.timeout_secs),
    )?);
    tracing::info!(endpoint = %launcher.endpoint(), "Flow launcher ready");
    let store = FileResultStore::new(config.storage.root.clone());

    // Pool broadcast
    let broadcaster = POOL.get_or_create(&shutdown_rx);
    let feeds = spawn_pool_feeds(
        source.as_ref(),
        &broadcaster,
        &config.broadcast.artifacts,
        &shutdown_rx,
    )?;

    // Hunt scheduling
    let mut orchestrator = HuntOrchestrator::new(
        Arc::clone(&source),
        Arc::clone(&registry),
        launcher,
        store,
        OrchestratorConfig {
            query: MonitoringQuery::participation(),
            result_extension: config.storage.extension.clone(),
        },
        shutdown_rx.clone(),
    );
    orchestrator.start().map_err(|e| {
        tracing::error!("Failed to start hunt orchestrator: {}", e);
        e
    })?;

    let state = AppState {
        source,
        registry,
        broadcaster,
        consumer_buffer: config.broadcast.consumer_buffer,
        shutdown_rx,
    };

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", config.server.listen);
    let result = run_server(router, config.server.listen, Arc::clone(&shutdown_tx)).await;

    // The server may also have stopped on a bind or accept error.
    shutdown_tx.send_replace(true);
    orchestrator.close().await;
    for feed in feeds {
        if let Err(e) = feed.await {
            tracing::warn!(error = %e, "Pool feed ended abnormally");
        }
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
