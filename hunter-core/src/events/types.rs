//! Event type definitions.
//!
//! Row and participation types come from `hunter-sdk` so the HTTP surface
//! and pool clients share them.

pub use hunter_sdk::objects::{ParticipationEvent, PoolMessage, Row};

/// Describes who is producing into the broadcaster.
///
/// Only used to label log output of the producer's fan-out task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerMeta {
    pub name: String,
}

impl ProducerMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for ProducerMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
