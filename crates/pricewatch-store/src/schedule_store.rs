use std::path::PathBuf;
use std::sync::Arc;

use pricewatch_core::error::AppError;
use pricewatch_core::schedule::{ScheduleEntry, ScheduleStore};
use tokio::sync::Mutex;

use crate::json_file::JsonFile;

/// Durable wake-up entries as a JSON array of `{name, fireAt}`.
/// Names are unique; putting an existing name replaces its entry.
#[derive(Clone)]
pub struct FileScheduleStore {
    file: Arc<JsonFile>,
    entries: Arc<Mutex<Vec<ScheduleEntry>>>,
}

impl FileScheduleStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let file = JsonFile::new(path.into());
        let entries: Vec<ScheduleEntry> = file.read().await?.unwrap_or_default();
        Ok(Self {
            file: Arc::new(file),
            entries: Arc::new(Mutex::new(entries)),
        })
    }
}

impl ScheduleStore for FileScheduleStore {
    async fn entries(&self) -> Result<Vec<ScheduleEntry>, AppError> {
        Ok(self.entries.lock().await.clone())
    }

    async fn put(&self, entry: ScheduleEntry) -> Result<(), AppError> {
        let mut entries = self.entries.lock().await;
        let mut next: Vec<ScheduleEntry> = entries
            .iter()
            .filter(|e| e.name != entry.name)
            .cloned()
            .collect();
        next.push(entry);
        self.file.write(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), AppError> {
        let mut entries = self.entries.lock().await;
        if !entries.iter().any(|e| e.name == name) {
            return Ok(());
        }
        let next: Vec<ScheduleEntry> = entries
            .iter()
            .filter(|e| e.name != name)
            .cloned()
            .collect();
        self.file.write(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        let mut entries = self.entries.lock().await;
        self.file.write(&Vec::<ScheduleEntry>::new()).await?;
        entries.clear();
        Ok(())
    }
}
