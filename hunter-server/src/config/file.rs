//! TOML file configuration structures.
//!
//! These structs directly map to the `hunter.toml` file format.

use hunter_core::events::DEFAULT_CHANNEL_BUFFER;
use hunter_core::output::DEFAULT_RESULT_EXTENSION;
use hunter_core::source::PARTICIPATION_ARTIFACT;
use hunter_sdk::objects::HuntRecord;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub flow_service: FlowServiceConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// Hunts loaded into the registry at startup.
    #[serde(default)]
    pub hunts: Vec<HuntRecord>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8889").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8889))
}

/// Where hunt results are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            extension: default_extension(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./hunt-results")
}

fn default_extension() -> String {
    DEFAULT_RESULT_EXTENSION.to_string()
}

/// Remote flow execution service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowServiceConfig {
    /// Base URL; flows are launched with `POST {url}/flows`.
    pub url: Url,
    /// Deadline for a single launch request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Artifacts accepted by the ingest endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_artifacts")]
    pub artifacts: Vec<String>,
    /// Rows buffered per subscriber before it lags.
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            artifacts: default_source_artifacts(),
            buffer: default_buffer(),
        }
    }
}

fn default_source_artifacts() -> Vec<String> {
    vec![PARTICIPATION_ARTIFACT.to_string()]
}

fn default_buffer() -> usize {
    DEFAULT_CHANNEL_BUFFER
}

/// Artifacts duplicated to pool clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Messages queued per pool client before new ones are dropped for it.
    #[serde(default = "default_consumer_buffer")]
    pub consumer_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            artifacts: Vec::new(),
            consumer_buffer: default_consumer_buffer(),
        }
    }
}

fn default_consumer_buffer() -> usize {
    64
}
