use std::fmt;
use std::future::Future;

use crate::batcher::DeliveryPayload;
use crate::checkpoint::Checkpoint;
use crate::error::AppError;
use crate::models::{CrawlResult, Task};

/// Handle to one page context inside a [`PageHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// Renders product pages and runs the extraction routine inside them.
pub trait PageHost: Send + Sync + Clone {
    /// Whether `tab` still exists. A closed tab must be recreated.
    fn is_tab_alive(&self, tab: TabId) -> impl Future<Output = bool> + Send;

    fn open_blank_tab(&self) -> impl Future<Output = Result<TabId, AppError>> + Send;

    /// Navigate and wait for the page to finish loading.
    fn navigate(
        &self,
        tab: TabId,
        url: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Run the extraction routine against the loaded page.
    fn extract(
        &self,
        tab: TabId,
        sku_id: &str,
    ) -> impl Future<Output = Result<CrawlResult, AppError>> + Send;
}

/// Key-value persistence of the engine checkpoint.
pub trait CheckpointStore: Send + Sync + Clone {
    /// Load every stored key. Keys never written are `None`.
    fn load(&self) -> impl Future<Output = Result<Checkpoint, AppError>> + Send;

    /// Merge the present keys of `patch` into the stored checkpoint.
    fn save(&self, patch: Checkpoint) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Posts result batches to the remote endpoint.
///
/// Deliveries run on their own task, hence the `'static` bound.
pub trait ResultDelivery: Send + Sync + Clone + 'static {
    fn deliver(
        &self,
        payload: &DeliveryPayload,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Supplies the ordered task list.
pub trait TargetSource: Send + Sync + Clone {
    fn fetch_targets(&self) -> impl Future<Output = Result<Vec<Task>, AppError>> + Send;
}

/// Called with every successfully extracted (or operator-skipped) item.
pub trait ItemCompleteHook: Send + Sync + Clone {
    fn on_item_complete(&self, result: &CrawlResult) -> impl Future<Output = ()> + Send;
}

/// Called once a flush has been acknowledged by the endpoint.
pub trait BatchSentHook: Send + Sync + Clone {
    fn on_batch_sent(
        &self,
        results: &[CrawlResult],
        current_index: usize,
    ) -> impl Future<Output = ()> + Send;
}

/// A no-op CheckpointStore for use when persistence is not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl CheckpointStore for NullStore {
    async fn load(&self) -> Result<Checkpoint, AppError> {
        Ok(Checkpoint::new())
    }

    async fn save(&self, _patch: Checkpoint) -> Result<(), AppError> {
        Ok(())
    }
}
