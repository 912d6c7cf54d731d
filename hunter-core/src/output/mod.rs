//! Per-hunt result writers.
//!
//! Each hunt's successfully dispatched participants are appended to one
//! result file named `<hunt>.<ext>`, one JSON object per line with the
//! columns `HuntId`, `ClientId`, `Fqdn`, `FlowId` and `Participate`.
//!
//! The cache creates a writer on first use and keeps it until
//! [`OutputWriterCache::close_all`] runs at orchestrator shutdown.

use crate::events::ParticipationEvent;
use crate::registry::registry_key;
use crate::storage::{ResultHandle, ResultStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default extension of result files.
pub const DEFAULT_RESULT_EXTENSION: &str = "json";

/// Writer shared between the cache and its callers.
pub type SharedWriter<H> = Arc<Mutex<OutputWriter<H>>>;

/// Appends participation rows for one hunt.
pub struct OutputWriter<H> {
    hunt_id: String,
    name: String,
    handle: H,
    rows_written: u64,
    closed: bool,
}

impl<H: ResultHandle> OutputWriter<H> {
    fn new(hunt_id: String, name: String, handle: H) -> Self {
        Self {
            hunt_id,
            name,
            handle,
            rows_written: 0,
            closed: false,
        }
    }

    pub fn hunt_id(&self) -> &str {
        &self.hunt_id
    }

    /// Storage name of the result file.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append one row.
    pub async fn write(&mut self, event: &ParticipationEvent) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::Closed(self.name.clone()));
        }
        let mut line = serde_json::to_vec(&event.to_row())?;
        line.push(b'\n');
        self.handle.append(&line).await?;
        self.rows_written += 1;
        Ok(())
    }

    /// Close the underlying handle. Returns `false` if already closed.
    pub async fn close(&mut self) -> Result<bool, StorageError> {
        if self.closed {
            return Ok(false);
        }
        self.closed = true;
        self.handle.close().await?;
        Ok(true)
    }
}

/// Derive the result file name for a hunt.
pub fn result_file_name(hunt_id: &str, extension: &str) -> Result<String, StorageError> {
    let base = registry_key(hunt_id);
    if base.is_empty() || base == "." || base == ".." || base.contains('\\') {
        return Err(StorageError::InvalidName(hunt_id.to_string()));
    }
    Ok(format!("{base}.{extension}"))
}

/// Creates and caches one [`OutputWriter`] per hunt.
pub struct OutputWriterCache<S: ResultStore> {
    store: S,
    extension: String,
    writers: Mutex<HashMap<String, SharedWriter<S::Handle>>>,
}

impl<S: ResultStore> OutputWriterCache<S> {
    pub fn new(store: S, extension: impl Into<String>) -> Self {
        Self {
            store,
            extension: extension.into(),
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Return the writer for `hunt_id`, opening it on first use.
    pub async fn get_or_create(&self, hunt_id: &str) -> Result<SharedWriter<S::Handle>, StorageError> {
        let name = result_file_name(hunt_id, &self.extension)?;

        let mut writers = self.writers.lock().await;
        if let Some(writer) = writers.get(&name) {
            return Ok(Arc::clone(writer));
        }

        let handle = self.store.write_file(&name).await?;
        debug!(hunt_id, name = %name, "Created hunt output writer");
        let writer = Arc::new(Mutex::new(OutputWriter::new(
            hunt_id.to_string(),
            name.clone(),
            handle,
        )));
        writers.insert(name, Arc::clone(&writer));
        Ok(writer)
    }

    pub async fn len(&self) -> usize {
        self.writers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.writers.lock().await.is_empty()
    }

    /// Close every cached writer. Writers already closed are skipped, so
    /// calling this again is a no-op. Returns how many writers were closed.
    pub async fn close_all(&self) -> usize {
        let writers: Vec<_> = self.writers.lock().await.values().cloned().collect();

        let mut closed = 0;
        for writer in writers {
            let mut writer = writer.lock().await;
            match writer.close().await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        hunt_id = %writer.hunt_id(),
                        error = %e,
                        "Failed to close hunt output writer"
                    );
                }
            }
        }

        if closed > 0 {
            info!(closed, "Closed hunt output writers");
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryResultStore;
    use hunter_sdk::objects::FlowId;

    fn event(hunt_id: &str, client_id: &str) -> ParticipationEvent {
        ParticipationEvent {
            hunt_id: hunt_id.into(),
            client_id: client_id.into(),
            fqdn: Some(format!("{client_id}.example.com")),
            flow_id: Some(FlowId::new("F.1")),
            participate: true,
        }
    }

    #[test]
    fn test_result_file_name() {
        assert_eq!(result_file_name("H.1", "json").unwrap(), "H.1.json");
        assert_eq!(result_file_name("hunts/H.1", "csv").unwrap(), "H.1.csv");
        assert!(result_file_name("", "json").is_err());
        assert!(result_file_name("hunts/..", "json").is_err());
        assert!(result_file_name("hunts/", "json").is_err());
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let store = MemoryResultStore::new();
        let cache = OutputWriterCache::new(store.clone(), DEFAULT_RESULT_EXTENSION);

        let first = cache.get_or_create("H.1").await.unwrap();
        let second = cache.get_or_create("H.1").await.unwrap();
        let other = cache.get_or_create("H.2").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(store.open_count("H.1.json"), 1);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_write_appends_json_lines() {
        let store = MemoryResultStore::new();
        let cache = OutputWriterCache::new(store.clone(), DEFAULT_RESULT_EXTENSION);

        let writer = cache.get_or_create("H.1").await.unwrap();
        {
            let mut writer = writer.lock().await;
            writer.write(&event("H.1", "C.1")).await.unwrap();
            writer.write(&event("H.1", "C.2")).await.unwrap();
            assert_eq!(writer.rows_written(), 2);
        }

        let lines = store.lines("H.1.json");
        assert_eq!(lines.len(), 2);
        let row: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(row["HuntId"], "H.1");
        assert_eq!(row["ClientId"], "C.2");
        assert_eq!(row["Fqdn"], "C.2.example.com");
        assert_eq!(row["FlowId"], "F.1");
        assert_eq!(row["Participate"], true);
    }

    #[tokio::test]
    async fn test_close_all_closes_each_writer_once() {
        let store = MemoryResultStore::new();
        let cache = OutputWriterCache::new(store.clone(), DEFAULT_RESULT_EXTENSION);
        cache.get_or_create("H.1").await.unwrap();
        let writer = cache.get_or_create("H.2").await.unwrap();

        assert_eq!(cache.close_all().await, 2);
        assert_eq!(cache.close_all().await, 0);

        assert_eq!(store.close_count("H.1.json"), 1);
        assert_eq!(store.close_count("H.2.json"), 1);

        let mut writer = writer.lock().await;
        assert!(writer.is_closed());
        assert!(matches!(
            writer.write(&event("H.2", "C.1")).await,
            Err(StorageError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn test_open_failure_is_not_cached() {
        let store = MemoryResultStore::new();
        let cache = OutputWriterCache::new(store.clone(), DEFAULT_RESULT_EXTENSION);

        store.set_fail_opens(true);
        assert!(cache.get_or_create("H.1").await.is_err());
        assert!(cache.is_empty().await);

        store.set_fail_opens(false);
        assert!(cache.get_or_create("H.1").await.is_ok());
    }
}
