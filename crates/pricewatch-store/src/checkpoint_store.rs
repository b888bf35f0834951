use std::path::PathBuf;
use std::sync::Arc;

use pricewatch_core::checkpoint::Checkpoint;
use pricewatch_core::error::AppError;
use pricewatch_core::traits::CheckpointStore;
use tokio::sync::Mutex;

use crate::json_file::JsonFile;

/// Checkpoint persistence in a single JSON object file.
///
/// The file is read once on [`open`](Self::open) and cached; every
/// [`save`](CheckpointStore::save) merges the patch into the cache and
/// rewrites the whole document.
#[derive(Clone)]
pub struct FileCheckpointStore {
    file: Arc<JsonFile>,
    cache: Arc<Mutex<Checkpoint>>,
}

impl FileCheckpointStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let file = JsonFile::new(path.into());
        let cached: Checkpoint = file.read().await?.unwrap_or_default();
        tracing::debug!(path = %file.path().display(), "Checkpoint store opened");
        Ok(Self {
            file: Arc::new(file),
            cache: Arc::new(Mutex::new(cached)),
        })
    }

    /// Drop every stored key.
    pub async fn clear(&self) -> Result<(), AppError> {
        let mut cache = self.cache.lock().await;
        self.file.remove().await?;
        *cache = Checkpoint::new();
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Checkpoint, AppError> {
        Ok(self.cache.lock().await.clone())
    }

    async fn save(&self, patch: Checkpoint) -> Result<(), AppError> {
        // Held across the write so concurrent saves land in order.
        let mut cache = self.cache.lock().await;
        let mut next = cache.clone();
        next.merge(patch);
        self.file.write(&next).await?;
        *cache = next;
        Ok(())
    }
}
