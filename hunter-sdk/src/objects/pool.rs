use super::Row;
use serde::{Deserialize, Serialize};

/// A monitoring row duplicated to every pool client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolMessage {
    /// Artifact the row was produced for.
    pub source: String,
    pub row: Row,
}
