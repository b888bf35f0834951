//! The crawl state machine.
//!
//! [`CrawlEngine`] walks the task list one item at a time. It never sleeps:
//! pacing and retry delays are session-scoped wake-ups, and deliveries run on
//! spawned tasks whose outcome comes back through a channel. All mutation
//! happens through `&mut self`, so a single owner (the runner actor) is the
//! in-flight guard.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::batcher::{FlushOutcome, ResultBatcher};
use crate::checkpoint::Checkpoint;
use crate::config::{CrawlConfig, CrawlConfigPatch, Settings};
use crate::error::AppError;
use crate::events::{CrawlEvent, EventSink, Notification, Notifier};
use crate::models::{CrawlResult, DEFAULT_PRODUCT_BASE_URL, Task, now_ms};
use crate::schedule::{WakeKind, WakeName, WakeScheduler};
use crate::session::SessionId;
use crate::traits::{
    BatchSentHook, CheckpointStore, ItemCompleteHook, PageHost, ResultDelivery, TabId,
};

const DELIVERY_ALERT: &str = "Failed to deliver crawl results. Please contact the development team.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    /// Waiting for the retry wake-up of a failed item.
    RetryWaiting,
    /// Halted by an error (retries exhausted or no working tab).
    Stopped,
    /// The cursor reached the end of the task list.
    Exhausted,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::RetryWaiting => "retry_waiting",
            EngineState::Stopped => "stopped",
            EngineState::Exhausted => "exhausted",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, EngineState::Running | EngineState::RetryWaiting)
    }
}

/// What [`CrawlEngine::on_wake`] did with a wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeDisposition {
    Handled,
    /// Belonged to another session; its entry was cancelled.
    Stale,
    /// Not a crawler wake-up name.
    Ignored,
    /// No wake-up of this kind is armed, e.g. one that fired just before a
    /// `stop`. Dropped without touching the cursor.
    Unarmed,
}

/// Read-only view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub state: EngineState,
    pub is_running: bool,
    pub current_index: usize,
    pub total_count: usize,
    pub retry_count: u32,
    pub batch_len: usize,
    pub flush_in_flight: bool,
    pub session_id: SessionId,
    pub config: CrawlConfig,
    pub refetched_at: Option<i64>,
    pub last_error: Option<String>,
}

/// Knobs that are fixed for the lifetime of an engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub product_base_url: String,
    /// Bound on one navigate + extract round trip.
    pub extract_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            product_base_url: DEFAULT_PRODUCT_BASE_URL.to_string(),
            extract_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&Settings> for EngineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            product_base_url: settings.product_base_url.clone(),
            extract_timeout: settings.extract_timeout(),
        }
    }
}

/// Collaborators injected into the engine.
pub struct EngineParts<H, S, W, D, IC, BS> {
    pub host: H,
    pub store: S,
    pub scheduler: W,
    pub delivery: D,
    pub on_item_complete: IC,
    pub on_batch_sent: BS,
    pub events: Arc<dyn EventSink>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct CrawlEngine<H, S, W, D, IC, BS>
where
    H: PageHost,
    S: CheckpointStore,
    W: WakeScheduler,
    D: ResultDelivery,
    IC: ItemCompleteHook,
    BS: BatchSentHook,
{
    host: H,
    store: S,
    scheduler: W,
    delivery: D,
    on_item_complete: IC,
    on_batch_sent: BS,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
    options: EngineOptions,
    session: SessionId,
    config: CrawlConfig,
    tasks: Vec<Task>,
    current_index: usize,
    refetched_at: Option<i64>,
    state: EngineState,
    retry_count: u32,
    last_error: Option<String>,
    batch: ResultBatcher,
    tab: Option<TabId>,
    armed: Option<WakeKind>,
    flush_tx: mpsc::UnboundedSender<FlushOutcome>,
}

impl<H, S, W, D, IC, BS> CrawlEngine<H, S, W, D, IC, BS>
where
    H: PageHost,
    S: CheckpointStore,
    W: WakeScheduler,
    D: ResultDelivery,
    IC: ItemCompleteHook,
    BS: BatchSentHook,
{
    /// Build an idle engine. Flush outcomes arrive on the returned receiver
    /// and must be fed back through [`CrawlEngine::complete_flush`].
    pub fn new(
        session: SessionId,
        config: CrawlConfig,
        parts: EngineParts<H, S, W, D, IC, BS>,
        options: EngineOptions,
    ) -> (Self, mpsc::UnboundedReceiver<FlushOutcome>) {
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let engine = Self {
            host: parts.host,
            store: parts.store,
            scheduler: parts.scheduler,
            delivery: parts.delivery,
            on_item_complete: parts.on_item_complete,
            on_batch_sent: parts.on_batch_sent,
            events: parts.events,
            notifier: parts.notifier,
            options,
            session,
            config,
            tasks: Vec::new(),
            current_index: 0,
            refetched_at: None,
            state: EngineState::Idle,
            retry_count: 0,
            last_error: None,
            batch: ResultBatcher::new(),
            tab: None,
            armed: None,
            flush_tx,
        };
        (engine, flush_rx)
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn refetched_at(&self) -> Option<i64> {
        self.refetched_at
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn flush_in_flight(&self) -> bool {
        self.batch.in_flight()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            is_running: self.is_running(),
            current_index: self.current_index,
            total_count: self.tasks.len(),
            retry_count: self.retry_count,
            batch_len: self.batch.len(),
            flush_in_flight: self.batch.in_flight(),
            session_id: self.session.clone(),
            config: self.config,
            refetched_at: self.refetched_at,
            last_error: self.last_error.clone(),
        }
    }

    /// Load a recovered task list without persisting it.
    pub fn restore(&mut self, tasks: Vec<Task>, current_index: usize, refetched_at: Option<i64>) {
        self.tasks = tasks;
        self.refetched_at = refetched_at;
        self.set_current_index(current_index);
    }

    /// Move the cursor, clamped into `[0, len]`.
    pub fn set_current_index(&mut self, index: usize) {
        self.current_index = index.min(self.tasks.len());
    }

    /// Replace the task list. Pending wake-ups are cancelled and the crawl
    /// goes idle at the first item.
    pub async fn set_task_list(&mut self, tasks: Vec<Task>, refetched_at: i64) {
        self.disarm(WakeKind::Next).await;
        self.disarm(WakeKind::Retry).await;

        self.tasks = tasks;
        self.current_index = 0;
        self.refetched_at = Some(refetched_at);
        self.state = EngineState::Idle;
        self.retry_count = 0;
        self.last_error = None;
        tracing::info!(total_count = self.tasks.len(), "Task list replaced");

        self.persist(
            Checkpoint::new()
                .with_task_list(self.tasks.clone())
                .with_current_index(0)
                .with_refetched_at(refetched_at)
                .with_running(false)
                .with_retry_count(0),
        )
        .await;
    }

    /// Merge a partial config update and persist the result.
    pub async fn update_config(&mut self, patch: &CrawlConfigPatch) -> Result<CrawlConfig, AppError> {
        let merged = self.config.apply(patch)?;
        self.config = merged;
        tracing::info!(
            batch_size = merged.batch_size,
            interval_min = merged.interval.min,
            interval_max = merged.interval.max,
            retry_max = merged.retry.max,
            retry_interval = merged.retry.interval,
            "Crawl config updated"
        );
        self.persist(Checkpoint::new().with_config(merged)).await;
        Ok(merged)
    }

    pub async fn start(&mut self) {
        if self.is_running() {
            tracing::debug!("Start ignored, crawl already running");
            return;
        }
        if self.tasks.is_empty() {
            tracing::info!("Start ignored, task list is empty");
            self.state = EngineState::Idle;
            self.persist(Checkpoint::new().with_running(false)).await;
            return;
        }
        if self.current_index >= self.tasks.len() {
            tracing::info!(current_index = self.current_index, "Start ignored, all items processed");
            self.state = EngineState::Exhausted;
            self.persist(Checkpoint::new().with_running(false)).await;
            return;
        }

        self.state = EngineState::Running;
        self.persist(Checkpoint::new().with_running(true)).await;
        self.events.emit(&CrawlEvent::CrawlStart {
            current_index: self.current_index,
            total_count: self.tasks.len(),
        });
        self.process_current().await;
    }

    /// Extract the current item if the crawl is running.
    pub async fn tick(&mut self) {
        if !self.is_running() || self.tasks.is_empty() {
            tracing::debug!(state = ?self.state, "Tick ignored");
            return;
        }
        self.state = EngineState::Running;
        self.process_current().await;
    }

    pub async fn stop(&mut self) {
        self.disarm(WakeKind::Next).await;
        self.disarm(WakeKind::Retry).await;
        self.retry_count = 0;
        self.state = EngineState::Idle;
        self.persist(Checkpoint::new().with_running(false).with_retry_count(0))
            .await;
        tracing::info!(current_index = self.current_index, "Crawl stopped");
        self.events.emit(&CrawlEvent::CrawlStop {
            current_index: self.current_index,
            total_count: self.tasks.len(),
        });
    }

    /// Abandon a scheduled retry without touching the cursor.
    pub async fn stop_retry(&mut self) {
        self.disarm(WakeKind::Retry).await;
        self.retry_count = 0;
        self.state = EngineState::Idle;
        self.persist(Checkpoint::new().with_running(false).with_retry_count(0))
            .await;
        self.events.emit(&CrawlEvent::RetryStop);
    }

    /// Dispatch a fired wake-up.
    pub async fn on_wake(&mut self, name: &str) -> WakeDisposition {
        let wake: WakeName = match name.parse() {
            Ok(wake) => wake,
            Err(e) => {
                tracing::debug!(%name, error = %e, "Ignoring wake-up");
                return WakeDisposition::Ignored;
            }
        };
        if !wake.belongs_to(&self.session) {
            tracing::info!(%name, session = %self.session, "Dropping wake-up from another session");
            if let Err(e) = self.scheduler.cancel(name).await {
                tracing::warn!(%name, error = %e, "Failed to cancel stale wake-up");
            }
            return WakeDisposition::Stale;
        }
        if self.armed != Some(wake.kind) {
            tracing::debug!(%name, armed = ?self.armed, "Dropping wake-up that is no longer armed");
            return WakeDisposition::Unarmed;
        }
        self.armed = None;
        self.tick().await;
        WakeDisposition::Handled
    }

    /// Record a failed result for the current item and move past it.
    ///
    /// Only allowed while the crawl is not running, typically after retries
    /// were exhausted.
    pub async fn skip_current(&mut self) -> Result<(), AppError> {
        if self.is_running() {
            return Err(AppError::InvalidState(
                "Cannot skip an item while the crawl is running".into(),
            ));
        }
        let Some(task) = self.tasks.get(self.current_index).cloned() else {
            return Err(AppError::InvalidState("No item left to skip".into()));
        };

        let reason = self
            .last_error
            .take()
            .unwrap_or_else(|| "Skipped by operator".to_string());
        tracing::info!(sku_id = %task.sku_id, current_index = self.current_index, %reason, "Skipping item");

        self.disarm(WakeKind::Retry).await;
        self.retry_count = 0;
        let result = CrawlResult::failed(task.sku_id.clone(), reason);
        self.on_item_complete.on_item_complete(&result).await;
        self.record(result, &task);
        self.advance(false).await;
        Ok(())
    }

    /// Settle a flush reported by the delivery task.
    pub async fn complete_flush(&mut self, outcome: FlushOutcome) {
        let pending = self.batch.complete(&outcome);
        let snapshot = &outcome.snapshot;

        match &outcome.error {
            None => {
                tracing::info!(
                    count = snapshot.results.len(),
                    is_last = snapshot.is_last,
                    remaining = self.batch.len(),
                    "Batch delivered"
                );
                self.on_batch_sent
                    .on_batch_sent(&snapshot.results, self.current_index)
                    .await;
                self.events.emit(&CrawlEvent::CrawlBatchComplete {
                    result_list: snapshot.results.clone(),
                    current_index: self.current_index,
                    total_count: self.tasks.len(),
                    page_size: self.config.batch_size,
                    is_last: snapshot.is_last,
                });
            }
            Some(error) => {
                tracing::error!(
                    count = snapshot.results.len(),
                    %error,
                    "Batch delivery failed, results kept for the next flush"
                );
                self.notifier.alert(DELIVERY_ALERT);
            }
        }

        if let Some(is_last) = pending {
            self.flush(is_last);
        }
    }

    async fn process_current(&mut self) {
        let Some(task) = self.tasks.get(self.current_index).cloned() else {
            return;
        };

        if let Err(e) = task.validate() {
            self.handle_error(e, Some(&task)).await;
            return;
        }
        let url = match task.product_url(&self.options.product_base_url) {
            Ok(url) => url,
            Err(e) => {
                self.handle_error(e, Some(&task)).await;
                return;
            }
        };
        let tab = match self.ensure_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                self.handle_error(e, None).await;
                return;
            }
        };

        tracing::info!(
            sku_id = %task.sku_id,
            current_index = self.current_index,
            retry_count = self.retry_count,
            %url,
            "Extracting item"
        );
        let timeout = self.options.extract_timeout;
        let attempt = async {
            self.host.navigate(tab, &url).await?;
            self.host.extract(tab, &task.sku_id).await
        };
        let outcome = tokio::time::timeout(timeout, attempt).await;

        match outcome {
            Ok(Ok(mut result)) => {
                result.sku_id = task.sku_id.clone();
                self.handle_success(result, &task).await;
            }
            Ok(Err(e)) => self.handle_error(e, Some(&task)).await,
            Err(_) => {
                self.handle_error(AppError::Timeout(timeout.as_secs()), Some(&task))
                    .await
            }
        }
    }

    async fn ensure_tab(&mut self) -> Result<TabId, AppError> {
        if let Some(tab) = self.tab {
            if self.host.is_tab_alive(tab).await {
                return Ok(tab);
            }
            tracing::info!(%tab, "Working tab is gone, opening a new one");
        }
        let tab = self.host.open_blank_tab().await?;
        self.tab = Some(tab);
        Ok(tab)
    }

    async fn handle_success(&mut self, result: CrawlResult, task: &Task) {
        self.retry_count = 0;
        self.last_error = None;
        self.disarm(WakeKind::Retry).await;
        self.disarm(WakeKind::Next).await;

        self.on_item_complete.on_item_complete(&result).await;
        self.events.emit(&CrawlEvent::CrawlSuccess {
            current_index: self.current_index,
            total_count: self.tasks.len(),
            result: result.clone(),
        });

        self.record(result, task);
        self.advance(true).await;
    }

    async fn handle_error(&mut self, err: AppError, item: Option<&Task>) {
        self.state = EngineState::Stopped;
        self.disarm(WakeKind::Next).await;

        let classification = err.classify();
        let detail = err.to_string();
        self.last_error = Some(detail.clone());
        self.events.emit(&CrawlEvent::CrawlError {
            error: classification.clone(),
            sku_id: item.map(|t| t.sku_id.clone()),
            detail: detail.clone(),
        });

        let Some(task) = item else {
            tracing::error!(error = %detail, "Crawl halted, no working tab");
            self.persist(Checkpoint::new().with_running(false)).await;
            return;
        };

        if self.retry_count < self.config.retry.max {
            self.retry_count += 1;
            self.state = EngineState::RetryWaiting;
            tracing::warn!(
                sku_id = %task.sku_id,
                error = %detail,
                retry_count = self.retry_count,
                max_retries = self.config.retry.max,
                "Item failed, retry scheduled"
            );
            self.persist(
                Checkpoint::new()
                    .with_running(true)
                    .with_retry_count(self.retry_count),
            )
            .await;
            self.arm(WakeKind::Retry, self.config.retry.interval).await;
            self.events.emit(&CrawlEvent::CrawlRetry {
                current_index: self.current_index,
                total_count: self.tasks.len(),
                sku_id: task.sku_id.clone(),
                retry_count: self.retry_count,
                max_retries: self.config.retry.max,
                retry_interval: self.config.retry.interval,
            });
        } else {
            self.retry_count = 0;
            self.disarm(WakeKind::Retry).await;
            self.events.emit(&CrawlEvent::CrawlFailed {
                sku_id: task.sku_id.clone(),
                error: classification,
            });
            self.notifier.notify(&Notification {
                id: format!("crawl-{}-failed", task.sku_id),
                title: "Price crawl halted".to_string(),
                message: format!("skuId: {}, error: {detail}", task.sku_id),
            });
            self.persist(Checkpoint::new().with_running(false).with_retry_count(0))
                .await;
        }
    }

    /// Push a finished item into the batch and flush if the trigger is met.
    fn record(&mut self, result: CrawlResult, task: &Task) {
        let is_last = self.current_index + 1 >= self.tasks.len();
        self.batch.push(result, task);
        if self.batch.should_flush(self.config.batch_size, is_last) {
            self.flush(is_last);
        }
    }

    /// Move past the current item. With `keep_running` the next item is
    /// scheduled after a jittered delay; otherwise the crawl idles.
    async fn advance(&mut self, keep_running: bool) {
        self.current_index += 1;
        self.persist(
            Checkpoint::new()
                .with_current_index(self.current_index)
                .with_retry_count(self.retry_count),
        )
        .await;

        if self.current_index >= self.tasks.len() {
            tracing::info!(total_count = self.tasks.len(), "All items processed");
            self.state = EngineState::Exhausted;
            self.persist(Checkpoint::new().with_running(false)).await;
            return;
        }

        self.events.emit(&CrawlEvent::CrawlProgress {
            current_index: self.current_index,
            total_count: self.tasks.len(),
            task: self.tasks.get(self.current_index).cloned(),
            status: "processing".to_string(),
        });

        if keep_running {
            let delay_ms = self.config.interval.next_delay_ms();
            tracing::debug!(%delay_ms, current_index = self.current_index, "Next item scheduled");
            self.arm(WakeKind::Next, delay_ms).await;
        } else {
            self.state = EngineState::Idle;
        }
    }

    /// Hand the current batch to a delivery task.
    fn flush(&mut self, is_last: bool) {
        let Some(snapshot) = self.batch.begin_flush(is_last, self.tasks.len()) else {
            return;
        };
        tracing::info!(count = snapshot.results.len(), is_last, "Flushing batch");

        let delivery = self.delivery.clone();
        let tx = self.flush_tx.clone();
        tokio::spawn(async move {
            let error = delivery
                .deliver(&snapshot.payload)
                .await
                .err()
                .map(|e| e.to_string());
            let _ = tx.send(FlushOutcome { snapshot, error });
        });
    }

    fn wake_name(&self, kind: WakeKind) -> String {
        WakeName::new(&self.session, kind).to_string()
    }

    async fn arm(&mut self, kind: WakeKind, delay_ms: u64) {
        self.armed = Some(kind);
        let name = self.wake_name(kind);
        let fire_at = now_ms() + delay_ms as i64;
        if let Err(e) = self.scheduler.schedule(&name, fire_at).await {
            tracing::error!(%name, error = %e, "Failed to schedule wake-up");
        }
    }

    async fn disarm(&mut self, kind: WakeKind) {
        if self.armed == Some(kind) {
            self.armed = None;
        }
        let name = self.wake_name(kind);
        if let Err(e) = self.scheduler.cancel(&name).await {
            tracing::warn!(%name, error = %e, "Failed to cancel wake-up");
        }
    }

    async fn persist(&self, patch: Checkpoint) {
        if let Err(e) = self.store.save(patch).await {
            tracing::error!(error = %e, "Failed to persist checkpoint");
        }
    }
}
