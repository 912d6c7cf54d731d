//! Result storage contract.
//!
//! A store opens named, append-only handles. Handles are owned by exactly one
//! output writer and closed once at shutdown.

mod fs;
mod memory;

pub use fs::{FileHandle, FileResultStore};
pub use memory::{MemoryHandle, MemoryResultStore};

use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode result row: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid result name: {0:?}")]
    InvalidName(String),

    #[error("result handle {0} is closed")]
    Closed(String),
}

pub trait ResultStore: Send + Sync + 'static {
    type Handle: ResultHandle;

    /// Open `name` for appending, creating it if needed.
    fn write_file(&self, name: &str) -> impl Future<Output = Result<Self::Handle, StorageError>> + Send;
}

pub trait ResultHandle: Send + 'static {
    fn append(&mut self, bytes: &[u8]) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Flush and release the handle.
    fn close(&mut self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
