//! Durable projection of engine state.
//!
//! One [`Checkpoint`] type serves both directions: a loaded snapshot (keys
//! that were never written are `None`) and a partial write (only the `Some`
//! keys are merged into the store).

use serde::{Deserialize, Serialize};

use crate::config::CrawlConfig;
use crate::models::{ResultSet, Task};
use crate::session::SessionId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_list: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_list: Option<ResultSet>,
    /// Epoch milliseconds of the last target-list refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refetched_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<CrawlConfig>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task_list(mut self, tasks: Vec<Task>) -> Self {
        self.task_list = Some(tasks);
        self
    }

    pub fn with_current_index(mut self, index: usize) -> Self {
        self.current_index = Some(index);
        self
    }

    pub fn with_result_list(mut self, results: ResultSet) -> Self {
        self.result_list = Some(results);
        self
    }

    pub fn with_refetched_at(mut self, at_ms: i64) -> Self {
        self.refetched_at = Some(at_ms);
        self
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.is_running = Some(running);
        self
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    pub fn with_session_id(mut self, session: SessionId) -> Self {
        self.session_id = Some(session);
        self
    }

    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overlay every key present in `patch`.
    pub fn merge(&mut self, patch: Checkpoint) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if patch.$field.is_some() { self.$field = patch.$field; })*
            };
        }
        overlay!(
            task_list,
            current_index,
            result_list,
            refetched_at,
            is_running,
            retry_count,
            session_id,
            config
        );
    }

    /// Prune after a process restart: keep only acknowledged results, move
    /// the cursor to the number of acknowledged results and clear the run flag.
    ///
    /// Returns the patch that has to be written back.
    pub fn rebase_for_new_session(&mut self) -> Checkpoint {
        let mut results = self.result_list.take().unwrap_or_default();
        results.retain_sent();
        let index = results.sent_count();

        self.result_list = Some(results.clone());
        self.current_index = Some(index);
        self.is_running = Some(false);

        Checkpoint::new()
            .with_result_list(results)
            .with_current_index(index)
            .with_running(false)
    }
}
