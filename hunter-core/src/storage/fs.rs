use super::{ResultHandle, ResultStore, StorageError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// Stores results as files under a root directory.
#[derive(Debug, Clone)]
pub struct FileResultStore {
    root: PathBuf,
}

impl FileResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub struct FileHandle {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl ResultStore for FileResultStore {
    type Handle = FileHandle;

    async fn write_file(&self, name: &str) -> Result<FileHandle, StorageError> {
        // Names are produced by the output cache; reject anything that
        // could escape the root anyway.
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(StorageError::InvalidName(name.to_string()));
        }

        fs::create_dir_all(&self.root).await?;
        let path = self.root.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        debug!(path = %path.display(), "Opened result file");
        Ok(FileHandle {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }
}

impl ResultHandle for FileHandle {
    async fn append(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.path.display().to_string()))?;
        writer.write_all(bytes).await?;
        // Each row is flushed so the trail survives a crash.
        writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
            debug!(path = %self.path.display(), "Closed result file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_appends_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path().join("results"));

        let mut handle = store.write_file("H.1.json").await.unwrap();
        handle.append(b"one\n").await.unwrap();
        handle.close().await.unwrap();

        // Reopening appends rather than truncating.
        let mut handle = store.write_file("H.1.json").await.unwrap();
        handle.append(b"two\n").await.unwrap();
        handle.close().await.unwrap();
        handle.close().await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("results/H.1.json")).unwrap();
        assert_eq!(contents, "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_rejects_names_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path());

        for name in ["", "..", "../escape.json", "a/b.json"] {
            assert!(matches!(
                store.write_file(name).await,
                Err(StorageError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_append_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path());
        let mut handle = store.write_file("H.2.json").await.unwrap();
        handle.close().await.unwrap();
        assert!(matches!(
            handle.append(b"late\n").await,
            Err(StorageError::Closed(_))
        ));
    }
}
