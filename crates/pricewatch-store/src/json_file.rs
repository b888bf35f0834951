use std::path::{Path, PathBuf};

use pricewatch_core::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

/// A single JSON document on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub(crate) struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the document. A missing file yields `None`.
    pub(crate) async fn read<T: DeserializeOwned>(&self) -> Result<Option<T>, AppError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::StorageError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::StorageError(format!("Corrupt state file {}: {e}", self.path.display()))
        })?;
        Ok(Some(value))
    }

    /// Write and fsync a sibling temp file, then rename over the target.
    pub(crate) async fn write<T: Serialize>(&self, value: &T) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = self.path.with_extension("json.tmp");
        let write_err =
            |e: std::io::Error| AppError::StorageError(format!("Failed to write {}: {e}", tmp.display()));

        let mut file = tokio::fs::File::create(&tmp).await.map_err(write_err)?;
        file.write_all(&bytes).await.map_err(write_err)?;
        // Data must be on disk before the rename makes it visible.
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::StorageError(format!(
                "Failed to replace {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }

    pub(crate) async fn remove(&self) -> Result<(), AppError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageError(format!(
                "Failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_replaces_document_without_leaving_temp_file() {
        let dir = TempDir::new().unwrap();
        let file = JsonFile::new(dir.path().join("state.json"));

        file.write(&serde_json::json!({ "currentIndex": 1 })).await.unwrap();
        file.write(&serde_json::json!({ "currentIndex": 2 })).await.unwrap();

        let value: serde_json::Value = file.read().await.unwrap().unwrap();
        assert_eq!(value["currentIndex"], 2);
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_missing_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let file = JsonFile::new(dir.path().join("state.json"));
        assert!(file.read::<serde_json::Value>().await.unwrap().is_none());

        tokio::fs::write(file.path(), b"{ not json").await.unwrap();
        let err = file.read::<serde_json::Value>().await.unwrap_err();
        assert!(err.to_string().contains("Corrupt state file"));
    }
}
