//! Process-start recovery.

use crate::checkpoint::Checkpoint;
use crate::config::CrawlConfig;
use crate::error::AppError;
use crate::models::{ResultSet, Task};
use crate::schedule::WakeScheduler;
use crate::session::SessionId;
use crate::traits::CheckpointStore;

/// Engine inputs recovered from the checkpoint.
#[derive(Debug, Clone)]
pub struct Restored {
    pub session: SessionId,
    pub is_new_session: bool,
    pub tasks: Vec<Task>,
    pub current_index: usize,
    pub results: ResultSet,
    pub refetched_at: Option<i64>,
    pub config: CrawlConfig,
    /// Wake-ups of earlier sessions that were cancelled.
    pub stale_wakeups: usize,
}

/// Load the checkpoint and prepare it for a fresh session.
///
/// Wake-ups from other sessions are cancelled, the new session id is
/// persisted and, on a new session, unacknowledged results are dropped and
/// the cursor is rebased onto the acknowledged ones. The crawl never resumes
/// on its own; the caller decides when to start.
pub async fn restore<S, W>(
    store: &S,
    scheduler: &W,
    defaults: CrawlConfig,
) -> Result<Restored, AppError>
where
    S: CheckpointStore,
    W: WakeScheduler,
{
    let mut snapshot = store.load().await?;
    let start = SessionId::detect(snapshot.session_id.as_ref());

    let stale_wakeups = scheduler.reconcile(&start.current).await?;
    store
        .save(Checkpoint::new().with_session_id(start.current.clone()))
        .await?;

    if start.is_new {
        let patch = snapshot.rebase_for_new_session();
        store.save(patch).await?;
        tracing::info!(
            session = %start.current,
            current_index = ?snapshot.current_index,
            "New session, unsent results dropped"
        );
    }

    let tasks = snapshot.task_list.unwrap_or_default();
    let current_index = snapshot.current_index.unwrap_or(0).min(tasks.len());
    let config = match snapshot.config {
        Some(config) if config.validate().is_ok() => config,
        Some(_) => {
            tracing::warn!("Stored crawl config is invalid, falling back to defaults");
            defaults
        }
        None => defaults,
    };

    Ok(Restored {
        session: start.current,
        is_new_session: start.is_new,
        tasks,
        current_index,
        results: snapshot.result_list.unwrap_or_default(),
        refetched_at: snapshot.refetched_at,
        config,
        stale_wakeups,
    })
}
