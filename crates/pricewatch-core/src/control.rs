//! Request/response surface used by the panel-facing front ends.

use serde::Serialize;

use crate::config::{CrawlConfig, CrawlConfigPatch};
use crate::engine::EngineStatus;
use crate::error::AppError;
use crate::events::UiCommand;
use crate::ledger::CheckpointLedger;
use crate::models::{CrawlResult, Task, now_ms};
use crate::runner::EngineHandle;
use crate::traits::{CheckpointStore, TargetSource};

/// Everything the panel needs to render its table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStatus {
    pub task_list: Vec<Task>,
    pub result_list: Vec<CrawlResult>,
    pub current_index: usize,
    pub batch_size: usize,
    /// Epoch milliseconds; 0 when the list was never fetched.
    pub refetched_at: i64,
    pub engine: EngineStatus,
}

/// Reply to a successful target-list refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetListRefreshed {
    pub batch_size: usize,
    pub task_list: Vec<Task>,
}

#[derive(Clone)]
pub struct Controller<T, S> {
    engine: EngineHandle,
    targets: T,
    ledger: CheckpointLedger<S>,
}

impl<T, S> Controller<T, S>
where
    T: TargetSource,
    S: CheckpointStore,
{
    pub fn new(engine: EngineHandle, targets: T, ledger: CheckpointLedger<S>) -> Self {
        Self {
            engine,
            targets,
            ledger,
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub async fn get_config(&self) -> Result<CrawlConfig, AppError> {
        Ok(self.engine.status().await?.config)
    }

    pub async fn update_config(&self, patch: CrawlConfigPatch) -> Result<CrawlConfig, AppError> {
        self.engine.update_config(patch).await
    }

    pub async fn current_status(&self) -> Result<CurrentStatus, AppError> {
        let engine = self.engine.status().await?;
        let task_list = self.engine.task_list().await?;
        let results = self.ledger.results().await;
        Ok(CurrentStatus {
            task_list,
            result_list: results.as_slice().to_vec(),
            current_index: engine.current_index,
            batch_size: engine.config.batch_size,
            refetched_at: engine.refetched_at.unwrap_or(0),
            engine,
        })
    }

    /// Pull a fresh task list and reset progress.
    ///
    /// A failed fetch leaves the task list, cursor and results untouched.
    pub async fn fetch_target_list(&self) -> Result<TargetListRefreshed, AppError> {
        let tasks = self.targets.fetch_targets().await?;
        tracing::info!(count = tasks.len(), "Fetched target list");

        self.ledger.reset().await;
        self.engine.replace_tasks(tasks.clone(), now_ms()).await?;
        let batch_size = self.engine.status().await?.config.batch_size;
        Ok(TargetListRefreshed {
            batch_size,
            task_list: tasks,
        })
    }

    pub async fn command(&self, command: UiCommand) -> Result<(), AppError> {
        self.engine.command(command).await
    }

    pub async fn skip(&self) -> Result<(), AppError> {
        self.engine.skip().await
    }
}
