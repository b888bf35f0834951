use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{CrawlResult, Task};

/// Lifecycle events pushed from the engine to the panel.
///
/// Serialized as `{"type": "CRAWL_PROGRESS", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum CrawlEvent {
    CrawlStart {
        current_index: usize,
        total_count: usize,
    },
    CrawlStop {
        current_index: usize,
        total_count: usize,
    },
    CrawlSuccess {
        current_index: usize,
        total_count: usize,
        #[serde(flatten)]
        result: CrawlResult,
    },
    /// The cursor moved; `task` is the item now pending, if any.
    CrawlProgress {
        current_index: usize,
        total_count: usize,
        #[serde(flatten)]
        task: Option<Task>,
        status: String,
    },
    CrawlError {
        /// User-facing classification.
        error: String,
        sku_id: Option<String>,
        /// Raw error message.
        detail: String,
    },
    CrawlRetry {
        current_index: usize,
        total_count: usize,
        sku_id: String,
        retry_count: u32,
        max_retries: u32,
        retry_interval: u64,
    },
    CrawlBatchComplete {
        result_list: Vec<CrawlResult>,
        current_index: usize,
        total_count: usize,
        page_size: usize,
        is_last: bool,
    },
    CrawlFailed {
        sku_id: String,
        error: String,
    },
    RetryStop,
}

impl CrawlEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlEvent::CrawlStart { .. } => "CRAWL_START",
            CrawlEvent::CrawlStop { .. } => "CRAWL_STOP",
            CrawlEvent::CrawlSuccess { .. } => "CRAWL_SUCCESS",
            CrawlEvent::CrawlProgress { .. } => "CRAWL_PROGRESS",
            CrawlEvent::CrawlError { .. } => "CRAWL_ERROR",
            CrawlEvent::CrawlRetry { .. } => "CRAWL_RETRY",
            CrawlEvent::CrawlBatchComplete { .. } => "CRAWL_BATCH_COMPLETE",
            CrawlEvent::CrawlFailed { .. } => "CRAWL_FAILED",
            CrawlEvent::RetryStop => "RETRY_STOP",
        }
    }
}

/// Commands sent from the panel to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiCommand {
    CrawlStart,
    CrawlStop,
    RetryStop,
}

impl std::str::FromStr for UiCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "start" | "crawl-start" => Ok(UiCommand::CrawlStart),
            "stop" | "crawl-stop" => Ok(UiCommand::CrawlStop),
            "retry-stop" => Ok(UiCommand::RetryStop),
            other => Err(format!("Unknown command: {other}")),
        }
    }
}

/// Receives engine events (decoupled from the transport to the panel).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CrawlEvent) {
        let _ = event;
    }
}

/// Broadcasts to every connected panel. Having no subscriber is not an error.
impl EventSink for broadcast::Sender<CrawlEvent> {
    fn emit(&self, event: &CrawlEvent) {
        let _ = self.send(event.clone());
    }
}

/// Fan-out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&self, event: &CrawlEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

/// Sink that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &CrawlEvent) {
        match event {
            CrawlEvent::CrawlStart {
                current_index,
                total_count,
            } => {
                tracing::info!(%current_index, %total_count, "Crawl started");
            }
            CrawlEvent::CrawlStop {
                current_index,
                total_count,
            } => {
                tracing::info!(%current_index, %total_count, "Crawl stopped");
            }
            CrawlEvent::CrawlSuccess {
                current_index,
                total_count,
                result,
            } => {
                tracing::info!(
                    %current_index,
                    %total_count,
                    sku_id = %result.sku_id,
                    status = %result.status,
                    "Item extracted"
                );
            }
            CrawlEvent::CrawlProgress {
                current_index,
                total_count,
                ..
            } => {
                tracing::debug!(%current_index, %total_count, "Next item pending");
            }
            CrawlEvent::CrawlError {
                error,
                sku_id,
                detail,
            } => {
                tracing::warn!(?sku_id, %error, %detail, "Item failed");
            }
            CrawlEvent::CrawlRetry {
                sku_id,
                retry_count,
                max_retries,
                retry_interval,
                ..
            } => {
                tracing::info!(%sku_id, %retry_count, %max_retries, %retry_interval, "Retry scheduled");
            }
            CrawlEvent::CrawlBatchComplete {
                result_list,
                is_last,
                ..
            } => {
                tracing::info!(count = result_list.len(), %is_last, "Batch delivered");
            }
            CrawlEvent::CrawlFailed { sku_id, error } => {
                tracing::error!(%sku_id, %error, "Crawl halted after exhausting retries");
            }
            CrawlEvent::RetryStop => {
                tracing::info!("Retry cancelled");
            }
        }
    }
}

/// A system notification raised on hard failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
}

/// Best-effort operator notifications. Failures to notify are swallowed.
pub trait Notifier: Send + Sync {
    /// Desktop/system style notification.
    fn notify(&self, notification: &Notification);

    /// Blocking user-facing alert (delivery failures).
    fn alert(&self, message: &str);
}

/// Notifier that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::error!(
            id = %notification.id,
            title = %notification.title,
            "{}",
            notification.message
        );
    }

    fn alert(&self, message: &str) {
        tracing::error!(alert = true, "{message}");
    }
}
