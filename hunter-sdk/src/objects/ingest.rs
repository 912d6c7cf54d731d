use serde::{Deserialize, Serialize};

/// Response of `POST /monitoring/{artifact}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Rows published to the artifact.
    pub accepted: usize,
}
