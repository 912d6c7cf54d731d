//! In-memory result store.
//!
//! Keeps every file's bytes and open/close counts so callers can inspect what
//! an orchestrator wrote. Opens can be made to fail to exercise storage error
//! paths.

use super::{ResultHandle, ResultStore, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryFile {
    contents: Vec<u8>,
    opens: usize,
    closes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryResultStore {
    files: Arc<Mutex<HashMap<String, MemoryFile>>>,
    fail_opens: Arc<AtomicBool>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `write_file` calls fail.
    pub fn set_fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::Relaxed);
    }

    pub fn contents(&self, name: &str) -> Option<String> {
        self.lock()
            .get(name)
            .map(|file| String::from_utf8_lossy(&file.contents).into_owned())
    }

    /// Non-empty lines written to `name`.
    pub fn lines(&self, name: &str) -> Vec<String> {
        self.contents(name)
            .map(|contents| {
                contents
                    .lines()
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn open_count(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, |file| file.opens)
    }

    pub fn close_count(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, |file| file.closes)
    }

    /// Number of distinct names ever opened.
    pub fn file_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MemoryHandle {
    name: String,
    files: Arc<Mutex<HashMap<String, MemoryFile>>>,
    closed: bool,
}

impl ResultStore for MemoryResultStore {
    type Handle = MemoryHandle;

    async fn write_file(&self, name: &str) -> Result<MemoryHandle, StorageError> {
        if self.fail_opens.load(Ordering::Relaxed) {
            return Err(StorageError::Io(std::io::Error::other(
                "memory store configured to fail",
            )));
        }
        self.lock().entry(name.to_string()).or_default().opens += 1;
        Ok(MemoryHandle {
            name: name.to_string(),
            files: Arc::clone(&self.files),
            closed: false,
        })
    }
}

impl ResultHandle for MemoryHandle {
    async fn append(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::Closed(self.name.clone()));
        }
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files
            .entry(self.name.clone())
            .or_default()
            .contents
            .extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        if !self.closed {
            self.closed = true;
            let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
            files.entry(self.name.clone()).or_default().closes += 1;
        }
        Ok(())
    }
}
