use std::sync::Arc;

use tokio::sync::Mutex;

use crate::checkpoint::Checkpoint;
use crate::models::{CrawlResult, ResultSet};
use crate::traits::{BatchSentHook, CheckpointStore, ItemCompleteHook};

/// Durable result list shared by the engine hooks and the control surface.
///
/// Every change is written through to the `resultList` checkpoint key. Store
/// failures are logged; the in-memory list stays authoritative until the
/// next successful write.
#[derive(Clone)]
pub struct CheckpointLedger<S> {
    results: Arc<Mutex<ResultSet>>,
    store: S,
}

impl<S: CheckpointStore> CheckpointLedger<S> {
    pub fn new(store: S, initial: ResultSet) -> Self {
        Self {
            results: Arc::new(Mutex::new(initial)),
            store,
        }
    }

    pub async fn results(&self) -> ResultSet {
        self.results.lock().await.clone()
    }

    /// Drop every result, e.g. after the task list was refreshed.
    pub async fn reset(&self) {
        let mut results = self.results.lock().await;
        results.clear();
        self.persist(&results).await;
    }

    async fn persist(&self, results: &ResultSet) {
        let patch = Checkpoint::new().with_result_list(results.clone());
        if let Err(e) = self.store.save(patch).await {
            tracing::error!(error = %e, "Failed to persist result list");
        }
    }
}

impl<S: CheckpointStore> ItemCompleteHook for CheckpointLedger<S> {
    async fn on_item_complete(&self, result: &CrawlResult) {
        let mut results = self.results.lock().await;
        results.upsert(result.clone());
        self.persist(&results).await;
    }
}

impl<S: CheckpointStore> BatchSentHook for CheckpointLedger<S> {
    async fn on_batch_sent(&self, batch: &[CrawlResult], current_index: usize) {
        let mut results = self.results.lock().await;
        results.mark_sent(batch.iter().map(|r| r.sku_id.as_str()));
        tracing::debug!(count = batch.len(), %current_index, "Marked batch as sent");
        self.persist(&results).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultStatus;
    use crate::testutil::MemoryCheckpointStore;

    #[tokio::test]
    async fn test_item_complete_upserts_and_persists() {
        let store = MemoryCheckpointStore::default();
        let ledger = CheckpointLedger::new(store.clone(), ResultSet::new());

        ledger
            .on_item_complete(&CrawlResult::failed("sku-1", "first"))
            .await;
        ledger
            .on_item_complete(&CrawlResult::failed("sku-1", "second"))
            .await;

        let stored = store.snapshot().await.result_list.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get("sku-1").unwrap().error.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_batch_sent_marks_results() {
        let store = MemoryCheckpointStore::default();
        let ledger = CheckpointLedger::new(store.clone(), ResultSet::new());
        let a = CrawlResult::failed("a", "x");
        let b = CrawlResult::failed("b", "y");
        ledger.on_item_complete(&a).await;
        ledger.on_item_complete(&b).await;

        ledger.on_batch_sent(&[a], 2).await;

        let results = ledger.results().await;
        assert_eq!(results.get("a").unwrap().status, ResultStatus::Sent);
        assert_eq!(results.get("b").unwrap().status, ResultStatus::Failed);
        assert_eq!(store.snapshot().await.result_list.unwrap().sent_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_stored_list() {
        let store = MemoryCheckpointStore::default();
        let ledger = CheckpointLedger::new(
            store.clone(),
            ResultSet::from(vec![CrawlResult::failed("a", "x")]),
        );
        ledger.reset().await;
        assert!(ledger.results().await.is_empty());
        assert!(store.snapshot().await.result_list.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_not_fatal() {
        let store = MemoryCheckpointStore::failing();
        let ledger = CheckpointLedger::new(store, ResultSet::new());
        ledger.on_item_complete(&CrawlResult::failed("a", "x")).await;
        assert_eq!(ledger.results().await.len(), 1);
    }
}
