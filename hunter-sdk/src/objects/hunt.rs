use super::FlowRequest;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HuntState {
    #[default]
    Unset,
    Paused,
    Running,
    Stopped,
    Archived,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuntStats {
    /// Number of clients a flow was scheduled for. Never decreases.
    #[serde(default)]
    pub total_clients_scheduled: u64,
    /// Once set, the hunt admits no further participants.
    #[serde(default)]
    pub stopped: bool,
}

/// A hunt as held by the hunt registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuntRecord {
    pub hunt_id: String,
    #[serde(default)]
    pub state: HuntState,
    /// Maximum number of clients to schedule; `0` means unlimited.
    #[serde(default)]
    pub client_limit: u64,
    #[serde(with = "time::serde::timestamp")]
    pub expires: OffsetDateTime,
    #[serde(default)]
    pub stats: HuntStats,
    /// Template merged with each participating client.
    #[serde(default)]
    pub start_request: FlowRequest,
}

impl HuntRecord {
    /// Whether the hunt currently admits scheduling, ignoring limits and expiry.
    pub fn is_running(&self) -> bool {
        self.state == HuntState::Running && !self.stats.stopped
    }

    /// Whether the client limit has been reached.
    pub fn limit_reached(&self) -> bool {
        self.client_limit > 0 && self.stats.total_clients_scheduled >= self.client_limit
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires
    }
}
