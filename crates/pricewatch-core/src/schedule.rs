//! Session-scoped wake-ups.
//!
//! The engine never sleeps in place: every "next item" and "retry" delay is a
//! named schedule entry `"<session>:crawler:<next|retry>"`. When the entry
//! fires, its name is handed back to the engine, which checks the session
//! segment before acting. Entries are mirrored into a durable
//! [`ScheduleStore`] so a restarted process can find and cancel the entries of
//! the previous lifetime.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::now_ms;
use crate::session::SessionId;

const NAMESPACE: &str = "crawler";

/// What a wake-up is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeKind {
    Next,
    Retry,
}

impl WakeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakeKind::Next => "next",
            WakeKind::Retry => "retry",
        }
    }
}

/// Parsed wake-up name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeName {
    pub session: SessionId,
    pub kind: WakeKind,
}

impl WakeName {
    pub fn new(session: &SessionId, kind: WakeKind) -> Self {
        Self {
            session: session.clone(),
            kind,
        }
    }

    pub fn belongs_to(&self, session: &SessionId) -> bool {
        &self.session == session
    }
}

impl fmt::Display for WakeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.session, NAMESPACE, self.kind.as_str())
    }
}

impl FromStr for WakeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(session), Some(namespace), Some(action)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("Malformed wake-up name: {s}"));
        };
        if session.is_empty() || namespace != NAMESPACE {
            return Err(format!("Unrecognised wake-up name: {s}"));
        }
        let kind = match action {
            "next" => WakeKind::Next,
            "retry" => WakeKind::Retry,
            other => return Err(format!("Unknown wake-up action '{other}' in {s}")),
        };
        Ok(Self {
            session: SessionId::from(session),
            kind,
        })
    }
}

/// Delay-based callback primitive used to wake the engine.
pub trait WakeScheduler: Send + Sync {
    /// Arm (or re-arm) `name` to fire at `fire_at_ms` (epoch milliseconds).
    fn schedule(
        &self,
        name: &str,
        fire_at_ms: i64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn cancel(&self, name: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn cancel_all(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Cancel every entry not owned by `current`, re-arming none.
    ///
    /// Returns the number of entries dropped.
    fn reconcile(
        &self,
        current: &SessionId,
    ) -> impl Future<Output = Result<usize, AppError>> + Send;
}

/// A persisted schedule entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub name: String,
    /// Epoch milliseconds.
    pub fire_at: i64,
}

/// Durable record of armed wake-ups, separate from the in-memory timers.
pub trait ScheduleStore: Send + Sync + Clone + 'static {
    fn entries(&self) -> impl Future<Output = Result<Vec<ScheduleEntry>, AppError>> + Send;

    fn put(&self, entry: ScheduleEntry) -> impl Future<Output = Result<(), AppError>> + Send;

    fn remove(&self, name: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op ScheduleStore for use when schedules need not be durable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScheduleStore;

impl ScheduleStore for NullScheduleStore {
    async fn entries(&self) -> Result<Vec<ScheduleEntry>, AppError> {
        Ok(vec![])
    }

    async fn put(&self, _entry: ScheduleEntry) -> Result<(), AppError> {
        Ok(())
    }

    async fn remove(&self, _name: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        Ok(())
    }
}

struct ArmedTimer {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TimerTable {
    next_generation: u64,
    armed: HashMap<String, ArmedTimer>,
}

/// [`WakeScheduler`] backed by tokio timers.
///
/// Fired names are delivered at most once per `schedule` call on the channel
/// returned by [`TokioWakeScheduler::new`]. Re-scheduling a name replaces the
/// previous timer.
#[derive(Clone)]
pub struct TokioWakeScheduler<P> {
    timers: Arc<Mutex<TimerTable>>,
    fired: mpsc::UnboundedSender<String>,
    store: P,
}

impl<P: ScheduleStore> TokioWakeScheduler<P> {
    pub fn new(store: P) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            timers: Arc::new(Mutex::new(TimerTable::default())),
            fired,
            store,
        };
        (scheduler, rx)
    }

    /// Names currently armed in memory.
    pub fn armed(&self) -> Vec<String> {
        let table = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<_> = table.armed.keys().cloned().collect();
        names.sort();
        names
    }

    fn disarm(&self, name: &str) {
        let mut table = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(timer) = table.armed.remove(name) {
            timer.cancel.cancel();
        }
    }
}

impl<P: ScheduleStore> WakeScheduler for TokioWakeScheduler<P> {
    async fn schedule(&self, name: &str, fire_at_ms: i64) -> Result<(), AppError> {
        self.store
            .put(ScheduleEntry {
                name: name.to_string(),
                fire_at: fire_at_ms,
            })
            .await?;

        let cancel = CancellationToken::new();
        let generation = {
            let mut table = self.timers.lock().unwrap_or_else(|e| e.into_inner());
            table.next_generation += 1;
            let generation = table.next_generation;
            let previous = table.armed.insert(
                name.to_string(),
                ArmedTimer {
                    generation,
                    cancel: cancel.clone(),
                },
            );
            if let Some(previous) = previous {
                previous.cancel.cancel();
            }
            generation
        };

        let delay = Duration::from_millis((fire_at_ms - now_ms()).max(0) as u64);
        let timers = Arc::clone(&self.timers);
        let fired = self.fired.clone();
        let store = self.store.clone();
        let name = name.to_string();
        tracing::debug!(%name, delay_ms = %delay.as_millis(), "Wake-up armed");

        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return,
            }
            let current = {
                let mut table = timers.lock().unwrap_or_else(|e| e.into_inner());
                let is_current = table
                    .armed
                    .get(&name)
                    .is_some_and(|t| t.generation == generation);
                if is_current {
                    table.armed.remove(&name);
                }
                is_current
            };
            if !current {
                return;
            }
            if let Err(e) = store.remove(&name).await {
                tracing::warn!(%name, error = %e, "Failed to drop fired schedule entry");
            }
            let _ = fired.send(name);
        });

        Ok(())
    }

    async fn cancel(&self, name: &str) -> Result<(), AppError> {
        self.disarm(name);
        self.store.remove(name).await
    }

    async fn cancel_all(&self) -> Result<(), AppError> {
        {
            let mut table = self.timers.lock().unwrap_or_else(|e| e.into_inner());
            for (_, timer) in table.armed.drain() {
                timer.cancel.cancel();
            }
        }
        self.store.clear().await
    }

    async fn reconcile(&self, current: &SessionId) -> Result<usize, AppError> {
        let mut dropped = 0;
        for entry in self.store.entries().await? {
            let owned = entry
                .name
                .parse::<WakeName>()
                .is_ok_and(|n| n.belongs_to(current));
            if !owned {
                tracing::info!(name = %entry.name, fire_at = entry.fire_at, "Cancelling stale wake-up");
                self.disarm(&entry.name);
                self.store.remove(&entry.name).await?;
                dropped += 1;
            }
        }
        Ok(dropped)
    }
}
