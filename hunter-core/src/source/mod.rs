//! Event source contract.
//!
//! A source evaluates monitoring queries into lazy row streams. Queries are
//! compiled once against the source (resolving the artifact), then watched;
//! every `watch` call starts an independent subscription.

mod ingest;

pub use ingest::IngestSource;

use crate::events::{Row, RowStream};
use thiserror::Error;

/// Artifact carrying client participation decisions.
pub const PARTICIPATION_ARTIFACT: &str = "System.Hunt.Participation";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("unknown artifact: {0}")]
    UnknownArtifact(String),
}

/// A monitoring query: watch one artifact, project some columns.
///
/// An empty column list selects every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringQuery {
    pub artifact: String,
    pub columns: Vec<String>,
}

impl MonitoringQuery {
    /// Select every column of `artifact`.
    pub fn all(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            columns: Vec::new(),
        }
    }

    /// The query the hunt orchestrator runs.
    pub fn participation() -> Self {
        Self {
            artifact: PARTICIPATION_ARTIFACT.to_string(),
            columns: ["HuntId", "ClientId", "Fqdn", "Participate"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl std::fmt::Display for MonitoringQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        write!(
            f,
            "SELECT {columns} FROM watch_monitoring(artifact='{}')",
            self.artifact
        )
    }
}

/// A query that a source has accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    query: MonitoringQuery,
}

impl CompiledQuery {
    pub fn new(query: MonitoringQuery) -> Self {
        Self { query }
    }

    pub fn artifact(&self) -> &str {
        &self.query.artifact
    }

    pub fn query(&self) -> &MonitoringQuery {
        &self.query
    }

    /// Keep only the selected columns. Columns absent from `row` stay absent.
    pub fn project(&self, row: Row) -> Row {
        if self.query.columns.is_empty() {
            return row;
        }
        let mut row = row;
        self.query
            .columns
            .iter()
            .filter_map(|column| row.remove_entry(column))
            .collect()
    }
}

pub trait EventSource: Send + Sync + 'static {
    /// Resolve `query` against this source.
    fn compile(&self, query: &MonitoringQuery) -> Result<CompiledQuery, SourceError>;

    /// Start a new subscription producing the query's rows.
    fn watch(&self, query: &CompiledQuery) -> RowStream;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_participation_query_text() {
        assert_eq!(
            MonitoringQuery::participation().to_string(),
            "SELECT HuntId, ClientId, Fqdn, Participate FROM \
             watch_monitoring(artifact='System.Hunt.Participation')"
        );
        assert_eq!(
            MonitoringQuery::all("Custom.Events").to_string(),
            "SELECT * FROM watch_monitoring(artifact='Custom.Events')"
        );
    }

    #[test]
    fn test_projection_keeps_selected_columns() {
        let compiled = CompiledQuery::new(MonitoringQuery::participation());
        let row = json!({
            "HuntId": "H.1",
            "ClientId": "C.1",
            "Participate": true,
            "_ts": 12345,
        });
        let serde_json::Value::Object(row) = row else {
            unreachable!()
        };

        let projected = compiled.project(row);
        assert_eq!(projected.len(), 3);
        assert!(projected.get("_ts").is_none());
        assert!(projected.get("Fqdn").is_none());
    }
}
