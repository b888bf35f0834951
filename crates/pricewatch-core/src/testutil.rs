//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::batcher::DeliveryPayload;
use crate::checkpoint::Checkpoint;
use crate::error::AppError;
use crate::events::{CrawlEvent, EventSink, Notification, Notifier};
use crate::models::{CrawlResult, PriceInfo, Task};
use crate::schedule::{ScheduleEntry, ScheduleStore, WakeName, WakeScheduler};
use crate::session::SessionId;
use crate::traits::{CheckpointStore, PageHost, ResultDelivery, TabId, TargetSource};

/// Build `n` valid tasks named `sku-0 .. sku-{n-1}`.
pub fn tasks(n: usize) -> Vec<Task> {
    (0..n)
        .map(|i| Task::new(format!("sku-{i}"), format!("p{i}"), format!("v{i}")))
        .collect()
}

pub fn priced(sku_id: &str) -> CrawlResult {
    CrawlResult::completed(
        sku_id,
        PriceInfo {
            original: 12_000,
            sales: 10_000,
            final_price: 9_500,
        },
        format!("Product {sku_id}"),
    )
}

// ---------------------------------------------------------------------------
// MockHost
// ---------------------------------------------------------------------------

#[derive(Default)]
struct HostState {
    extractions: Vec<Result<CrawlResult, AppError>>,
    open_failures: Vec<AppError>,
    alive: bool,
    next_tab: u64,
    opened: usize,
    navigations: Vec<String>,
    extract_delay: Option<Duration>,
}

/// Page host returning queued extraction results.
///
/// When the queue is empty, extraction succeeds with [`priced`].
#[derive(Clone)]
pub struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState::default())),
        }
    }

    pub fn with_extractions(results: Vec<Result<CrawlResult, AppError>>) -> Self {
        let host = Self::new();
        host.state.lock().unwrap().extractions = results;
        host
    }

    pub fn push_extraction(&self, result: Result<CrawlResult, AppError>) {
        self.state.lock().unwrap().extractions.push(result);
    }

    /// Make the next `open_blank_tab` call fail.
    pub fn fail_next_open(&self, error: AppError) {
        self.state.lock().unwrap().open_failures.push(error);
    }

    /// Simulate the user closing the working tab.
    pub fn close_tab(&self) {
        self.state.lock().unwrap().alive = false;
    }

    pub fn set_extract_delay(&self, delay: Duration) {
        self.state.lock().unwrap().extract_delay = Some(delay);
    }

    pub fn opened_tabs(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PageHost for MockHost {
    async fn is_tab_alive(&self, _tab: TabId) -> bool {
        self.state.lock().unwrap().alive
    }

    async fn open_blank_tab(&self) -> Result<TabId, AppError> {
        let mut state = self.state.lock().unwrap();
        if !state.open_failures.is_empty() {
            return Err(state.open_failures.remove(0));
        }
        state.next_tab += 1;
        state.opened += 1;
        state.alive = true;
        Ok(TabId(state.next_tab))
    }

    async fn navigate(&self, _tab: TabId, url: &str) -> Result<(), AppError> {
        self.state.lock().unwrap().navigations.push(url.to_string());
        Ok(())
    }

    async fn extract(&self, _tab: TabId, sku_id: &str) -> Result<CrawlResult, AppError> {
        let delay = self.state.lock().unwrap().extract_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.extractions.is_empty() {
            Ok(priced(sku_id))
        } else {
            state.extractions.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryCheckpointStore
// ---------------------------------------------------------------------------

/// In-memory checkpoint store that records every write.
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    snapshot: Arc<Mutex<Checkpoint>>,
    saves: Arc<Mutex<Vec<Checkpoint>>>,
    fail: bool,
}

impl MemoryCheckpointStore {
    pub fn with_snapshot(snapshot: Checkpoint) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(snapshot)),
            ..Default::default()
        }
    }

    /// A store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub async fn snapshot(&self) -> Checkpoint {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<Checkpoint> {
        self.saves.lock().unwrap().clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Checkpoint, AppError> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn save(&self, patch: Checkpoint) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::StorageError("disk full".into()));
        }
        self.saves.lock().unwrap().push(patch.clone());
        self.snapshot.lock().unwrap().merge(patch);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockScheduler
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SchedulerState {
    active: BTreeMap<String, i64>,
    scheduled: Vec<String>,
    cancelled: Vec<String>,
}

/// Scheduler that only records. Tests fire wake-ups by hand.
#[derive(Clone, Default)]
pub struct MockScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl MockScheduler {
    /// Pre-arm an entry, e.g. one left over from a previous session.
    pub fn arm(&self, name: &str, fire_at_ms: i64) {
        self.state
            .lock()
            .unwrap()
            .active
            .insert(name.to_string(), fire_at_ms);
    }

    /// Currently armed names, sorted.
    pub fn active(&self) -> Vec<String> {
        self.state.lock().unwrap().active.keys().cloned().collect()
    }

    pub fn fire_at(&self, name: &str) -> Option<i64> {
        self.state.lock().unwrap().active.get(name).copied()
    }

    /// Every name passed to `schedule`, in call order.
    pub fn scheduled(&self) -> Vec<String> {
        self.state.lock().unwrap().scheduled.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

impl WakeScheduler for MockScheduler {
    async fn schedule(&self, name: &str, fire_at_ms: i64) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.active.insert(name.to_string(), fire_at_ms);
        state.scheduled.push(name.to_string());
        Ok(())
    }

    async fn cancel(&self, name: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.active.remove(name);
        state.cancelled.push(name.to_string());
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let names: Vec<_> = std::mem::take(&mut state.active).into_keys().collect();
        state.cancelled.extend(names);
        Ok(())
    }

    async fn reconcile(&self, current: &SessionId) -> Result<usize, AppError> {
        let mut state = self.state.lock().unwrap();
        let stale: Vec<String> = state
            .active
            .keys()
            .filter(|name| {
                !name
                    .parse::<WakeName>()
                    .is_ok_and(|n| n.belongs_to(current))
            })
            .cloned()
            .collect();
        for name in &stale {
            state.active.remove(name);
            state.cancelled.push(name.clone());
        }
        Ok(stale.len())
    }
}

// ---------------------------------------------------------------------------
// MemoryScheduleStore
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryScheduleStore {
    entries: Arc<Mutex<Vec<ScheduleEntry>>>,
}

impl MemoryScheduleStore {
    /// Stored names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        names.sort();
        names
    }
}

impl ScheduleStore for MemoryScheduleStore {
    async fn entries(&self) -> Result<Vec<ScheduleEntry>, AppError> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn put(&self, entry: ScheduleEntry) -> Result<(), AppError> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.name != entry.name);
        entries.push(entry);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), AppError> {
        self.entries.lock().unwrap().retain(|e| e.name != name);
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockDelivery
// ---------------------------------------------------------------------------

/// Delivery endpoint returning queued outcomes (success when empty).
#[derive(Clone, Default)]
pub struct MockDelivery {
    payloads: Arc<Mutex<Vec<DeliveryPayload>>>,
    responses: Arc<Mutex<Vec<Result<(), AppError>>>>,
}

impl MockDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push(Err(AppError::DeliveryFailed(message.to_string())));
    }

    pub fn payloads(&self) -> Vec<DeliveryPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

impl ResultDelivery for MockDelivery {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), AppError> {
        self.payloads.lock().unwrap().push(payload.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockTargetSource
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockTargetSource {
    responses: Arc<Mutex<Vec<Result<Vec<Task>, AppError>>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockTargetSource {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self::with_responses(vec![Ok(tasks)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<Vec<Task>, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl TargetSource for MockTargetSource {
    async fn fetch_targets(&self) -> Result<Vec<Task>, AppError> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(vec![])
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSink / RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<CrawlEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Wire type of every recorded event.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &CrawlEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    notifications: Arc<Mutex<Vec<Notification>>>,
    alerts: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.notifications
            .lock()
            .unwrap()
            .push(notification.clone());
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}
