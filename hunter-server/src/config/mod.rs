//! Configuration module for hunter-server.
//!
//! Handles loading configuration from TOML files and CLI arguments.

pub mod file;

use crate::config::file::FileConfig;
use hunter_core::source::PARTICIPATION_ARTIFACT;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub listen: Option<SocketAddr>,
    pub flow_service_url: Option<Url>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    overrides: CliOverrides,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, overrides: CliOverrides) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            overrides,
        }
    }

    /// Load and validate the configuration.
    pub fn load(&self) -> Result<FileConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.parse(&config_content)
    }

    fn parse(&self, content: &str) -> Result<FileConfig, ConfigError> {
        let mut config: FileConfig = toml::from_str(content)?;

        // Apply CLI overrides
        if let Some(listen) = self.overrides.listen {
            config.server.listen = listen;
        }
        if let Some(url) = &self.overrides.flow_service_url {
            config.flow_service.url = url.clone();
        }

        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let extension = &config.storage.extension;
    if extension.is_empty() || extension.contains(['/', '\\', '.']) {
        return Err(ConfigError::ValidationError(format!(
            "storage extension {extension:?} must be a non-empty plain suffix"
        )));
    }

    if config.flow_service.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "flow_service.timeout_secs must be positive".into(),
        ));
    }

    let sources: HashSet<&str> = config.source.artifacts.iter().map(String::as_str).collect();
    if !sources.contains(PARTICIPATION_ARTIFACT) {
        return Err(ConfigError::ValidationError(format!(
            "source.artifacts must include {PARTICIPATION_ARTIFACT}"
        )));
    }
    for artifact in &config.broadcast.artifacts {
        if !sources.contains(artifact.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "broadcast artifact {artifact} is not a source artifact"
            )));
        }
    }

    if config.broadcast.consumer_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "broadcast.consumer_buffer must be positive".into(),
        ));
    }

    let mut hunt_ids = HashSet::new();
    for hunt in &config.hunts {
        if hunt.hunt_id.is_empty() {
            return Err(ConfigError::ValidationError("hunt with empty hunt_id".into()));
        }
        if !hunt_ids.insert(hunt.hunt_id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate hunt {}",
                hunt.hunt_id
            )));
        }
    }

    Ok(())
}
