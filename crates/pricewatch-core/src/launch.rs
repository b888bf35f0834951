//! Wires restore, the result ledger, the engine and its runner together.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::restore;
use crate::config::CrawlConfig;
use crate::control::Controller;
use crate::engine::{CrawlEngine, EngineOptions, EngineParts};
use crate::error::AppError;
use crate::events::{EventSink, Notifier};
use crate::ledger::CheckpointLedger;
use crate::runner::CrawlRunner;
use crate::schedule::{ScheduleStore, TokioWakeScheduler};
use crate::session::SessionId;
use crate::traits::{CheckpointStore, PageHost, ResultDelivery, TargetSource};

/// Concrete collaborators for one crawler process.
pub struct CrawlerDeps<H, S, P, D, T> {
    pub host: H,
    pub store: S,
    pub schedule_store: P,
    pub delivery: D,
    pub targets: T,
    pub events: Arc<dyn EventSink>,
    pub notifier: Arc<dyn Notifier>,
}

/// A running crawler: the control surface plus the runner task.
pub struct Crawler<T, S> {
    pub controller: Controller<T, S>,
    pub session: SessionId,
    pub is_new_session: bool,
    runner: JoinHandle<()>,
}

impl<T, S> Crawler<T, S> {
    /// Wait for the runner to exit after `cancel` fired.
    pub async fn join(self) {
        if let Err(e) = self.runner.await {
            tracing::error!(error = %e, "Crawl runner panicked");
        }
    }
}

/// Restore persisted state and spawn the runner. The engine starts idle.
pub async fn launch<H, S, P, D, T>(
    deps: CrawlerDeps<H, S, P, D, T>,
    defaults: CrawlConfig,
    options: EngineOptions,
    cancel: CancellationToken,
) -> Result<Crawler<T, S>, AppError>
where
    H: PageHost + 'static,
    S: CheckpointStore + 'static,
    P: ScheduleStore,
    D: ResultDelivery,
    T: TargetSource,
{
    let (scheduler, wake_rx) = TokioWakeScheduler::new(deps.schedule_store);
    let restored = restore(&deps.store, &scheduler, defaults).await?;
    if restored.stale_wakeups > 0 {
        tracing::info!(count = restored.stale_wakeups, "Dropped wake-ups of a previous session");
    }

    let ledger = CheckpointLedger::new(deps.store.clone(), restored.results);
    let parts = EngineParts {
        host: deps.host,
        store: deps.store,
        scheduler,
        delivery: deps.delivery,
        on_item_complete: ledger.clone(),
        on_batch_sent: ledger.clone(),
        events: deps.events,
        notifier: deps.notifier,
    };
    let (mut engine, flush_rx) =
        CrawlEngine::new(restored.session.clone(), restored.config, parts, options);
    engine.restore(restored.tasks, restored.current_index, restored.refetched_at);

    let (runner, handle) = CrawlRunner::new(engine, flush_rx, wake_rx);
    let runner = tokio::spawn(runner.run(cancel));

    Ok(Crawler {
        controller: Controller::new(handle, deps.targets, ledger),
        session: restored.session,
        is_new_session: restored.is_new_session,
        runner,
    })
}
