//! Hunt registry contract.
//!
//! The registry owns hunt records. Callers never hold a record; they submit
//! a pure transition `HuntRecord -> (HuntRecord, O)` which the registry
//! applies atomically and exclusively per hunt id, committing the returned
//! record and handing `O` back.

mod memory;
mod transition;

pub use memory::InMemoryHuntRegistry;
pub use transition::{schedule_client, EligibilityError};

use hunter_sdk::objects::HuntRecord;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("hunt not found: {0}")]
    NotFound(String),
}

pub trait HuntRegistry: Send + Sync + 'static {
    /// Apply `transition` to the record of `hunt_id`.
    ///
    /// No other modification of the same hunt runs concurrently; hunts with
    /// different ids may be modified in parallel.
    fn modify_hunt<F, O>(
        &self,
        hunt_id: &str,
        transition: F,
    ) -> impl Future<Output = Result<O, RegistryError>> + Send
    where
        F: FnOnce(HuntRecord) -> (HuntRecord, O) + Send,
        O: Send;
}

/// Registry key for a hunt id: its last path component.
pub fn registry_key(hunt_id: &str) -> &str {
    hunt_id.rsplit('/').next().unwrap_or(hunt_id)
}
