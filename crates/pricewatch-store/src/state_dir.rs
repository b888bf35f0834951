use std::path::{Path, PathBuf};

use pricewatch_core::AppError;

use crate::checkpoint_store::FileCheckpointStore;
use crate::config::StoreConfig;
use crate::schedule_store::FileScheduleStore;

const CHECKPOINT_FILE: &str = "checkpoint.json";
const SCHEDULE_FILE: &str = "schedules.json";

/// Facade over the state directory. Creates it on open and vends the
/// file-backed stores that live inside it.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub async fn open(config: &StoreConfig) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&config.state_dir)
            .await
            .map_err(|e| {
                AppError::StorageError(format!(
                    "Failed to create state directory {}: {e}",
                    config.state_dir.display()
                ))
            })?;
        tracing::info!(path = %config.state_dir.display(), "Using state directory");
        Ok(Self {
            root: config.state_dir.clone(),
        })
    }

    pub async fn checkpoint_store(&self) -> Result<FileCheckpointStore, AppError> {
        FileCheckpointStore::open(self.root.join(CHECKPOINT_FILE)).await
    }

    pub async fn schedule_store(&self) -> Result<FileScheduleStore, AppError> {
        FileScheduleStore::open(self.root.join(SCHEDULE_FILE)).await
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}
