//! In-process hunt registry.
//!
//! Each record sits behind its own async mutex, so read-modify-write is
//! exclusive per hunt while different hunts never wait on each other beyond
//! the map lookup.

use super::{registry_key, HuntRegistry, RegistryError};
use hunter_sdk::objects::HuntRecord;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Default)]
pub struct InMemoryHuntRegistry {
    hunts: RwLock<HashMap<String, Arc<Mutex<HuntRecord>>>>,
}

impl InMemoryHuntRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with `records`.
    pub fn with_hunts(records: impl IntoIterator<Item = HuntRecord>) -> Self {
        let hunts = records
            .into_iter()
            .map(|record| {
                (
                    registry_key(&record.hunt_id).to_string(),
                    Arc::new(Mutex::new(record)),
                )
            })
            .collect();
        Self {
            hunts: RwLock::new(hunts),
        }
    }

    /// Insert or replace a hunt, returning the previous record.
    ///
    /// A replacement goes through the hunt's existing lock so it is ordered
    /// with concurrent modifications. It keeps the larger scheduled count and
    /// a stop already recorded, so replacing a hunt never re-opens it.
    pub async fn insert_hunt(&self, record: HuntRecord) -> Option<HuntRecord> {
        let key = registry_key(&record.hunt_id).to_string();
        let existing = self.hunts.read().await.get(&key).cloned();
        if let Some(slot) = existing {
            let mut guard = slot.lock().await;
            return Some(replace_keeping_stats(&mut guard, record));
        }

        let mut hunts = self.hunts.write().await;
        match hunts.get(&key).cloned() {
            // Lost a race with another insert of the same hunt.
            Some(slot) => {
                drop(hunts);
                let mut guard = slot.lock().await;
                Some(replace_keeping_stats(&mut guard, record))
            }
            None => {
                debug!(hunt_id = %key, "Registered hunt");
                hunts.insert(key, Arc::new(Mutex::new(record)));
                None
            }
        }
    }

    pub async fn get_hunt(&self, hunt_id: &str) -> Option<HuntRecord> {
        let slot = self.hunts.read().await.get(registry_key(hunt_id)).cloned()?;
        let record = slot.lock().await.clone();
        Some(record)
    }

    /// All hunts, ordered by id.
    pub async fn list_hunts(&self) -> Vec<HuntRecord> {
        let slots: Vec<_> = self.hunts.read().await.values().cloned().collect();
        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            records.push(slot.lock().await.clone());
        }
        records.sort_by(|a, b| a.hunt_id.cmp(&b.hunt_id));
        records
    }
}

fn replace_keeping_stats(current: &mut HuntRecord, mut record: HuntRecord) -> HuntRecord {
    record.stats.total_clients_scheduled = record
        .stats
        .total_clients_scheduled
        .max(current.stats.total_clients_scheduled);
    record.stats.stopped |= current.stats.stopped;
    std::mem::replace(current, record)
}

impl HuntRegistry for InMemoryHuntRegistry {
    async fn modify_hunt<F, O>(&self, hunt_id: &str, transition: F) -> Result<O, RegistryError>
    where
        F: FnOnce(HuntRecord) -> (HuntRecord, O) + Send,
        O: Send,
    {
        let key = registry_key(hunt_id);
        let slot = self
            .hunts
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;

        let mut guard = slot.lock().await;
        let (next, outcome) = transition(guard.clone());
        *guard = next;
        Ok(outcome)
    }
}
