//! Single-task actor owning the [`CrawlEngine`].
//!
//! Control messages, fired wake-ups and flush outcomes are all funnelled into
//! one `select!` loop, so the engine is only ever touched from one task.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::batcher::FlushOutcome;
use crate::config::{CrawlConfig, CrawlConfigPatch};
use crate::engine::{CrawlEngine, EngineStatus};
use crate::error::AppError;
use crate::events::UiCommand;
use crate::models::Task;
use crate::schedule::WakeScheduler;
use crate::traits::{
    BatchSentHook, CheckpointStore, ItemCompleteHook, PageHost, ResultDelivery,
};

const CONTROL_CAPACITY: usize = 32;
/// How long shutdown waits for an in-flight delivery to report back.
const SHUTDOWN_FLUSH_GRACE: Duration = Duration::from_secs(10);

enum ControlMessage {
    Command(UiCommand),
    Skip(oneshot::Sender<Result<(), AppError>>),
    ReplaceTasks {
        tasks: Vec<Task>,
        refetched_at: i64,
        reply: oneshot::Sender<()>,
    },
    UpdateConfig {
        patch: CrawlConfigPatch,
        reply: oneshot::Sender<Result<CrawlConfig, AppError>>,
    },
    Status(oneshot::Sender<EngineStatus>),
    TaskList(oneshot::Sender<Vec<Task>>),
}

/// Cloneable handle for talking to a running [`CrawlRunner`].
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<ControlMessage>,
}

impl EngineHandle {
    async fn send(&self, msg: ControlMessage) -> Result<(), AppError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| AppError::Generic("Crawl engine has shut down".into()))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControlMessage,
    ) -> Result<T, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await
            .map_err(|_| AppError::Generic("Crawl engine dropped the request".into()))
    }

    /// Queue a panel command. Returns once the runner accepted it.
    pub async fn command(&self, command: UiCommand) -> Result<(), AppError> {
        self.send(ControlMessage::Command(command)).await
    }

    pub async fn skip(&self) -> Result<(), AppError> {
        self.request(ControlMessage::Skip).await?
    }

    pub async fn replace_tasks(&self, tasks: Vec<Task>, refetched_at: i64) -> Result<(), AppError> {
        self.request(|reply| ControlMessage::ReplaceTasks {
            tasks,
            refetched_at,
            reply,
        })
        .await
    }

    pub async fn update_config(&self, patch: CrawlConfigPatch) -> Result<CrawlConfig, AppError> {
        self.request(|reply| ControlMessage::UpdateConfig { patch, reply })
            .await?
    }

    pub async fn status(&self) -> Result<EngineStatus, AppError> {
        self.request(ControlMessage::Status).await
    }

    pub async fn task_list(&self) -> Result<Vec<Task>, AppError> {
        self.request(ControlMessage::TaskList).await
    }
}

pub struct CrawlRunner<H, S, W, D, IC, BS>
where
    H: PageHost,
    S: CheckpointStore,
    W: WakeScheduler,
    D: ResultDelivery,
    IC: ItemCompleteHook,
    BS: BatchSentHook,
{
    engine: CrawlEngine<H, S, W, D, IC, BS>,
    control_rx: mpsc::Receiver<ControlMessage>,
    wake_rx: mpsc::UnboundedReceiver<String>,
    flush_rx: mpsc::UnboundedReceiver<FlushOutcome>,
}

impl<H, S, W, D, IC, BS> CrawlRunner<H, S, W, D, IC, BS>
where
    H: PageHost,
    S: CheckpointStore,
    W: WakeScheduler,
    D: ResultDelivery,
    IC: ItemCompleteHook,
    BS: BatchSentHook,
{
    pub fn new(
        engine: CrawlEngine<H, S, W, D, IC, BS>,
        flush_rx: mpsc::UnboundedReceiver<FlushOutcome>,
        wake_rx: mpsc::UnboundedReceiver<String>,
    ) -> (Self, EngineHandle) {
        let (tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let runner = Self {
            engine,
            control_rx,
            wake_rx,
            flush_rx,
        };
        (runner, EngineHandle { tx })
    }

    /// Run until cancelled or every input channel closed.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            session = %self.engine.session(),
            total_count = self.engine.tasks().len(),
            current_index = self.engine.current_index(),
            "Crawl runner started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(msg) = self.control_rx.recv() => self.dispatch(msg).await,
                Some(name) = self.wake_rx.recv() => {
                    self.engine.on_wake(&name).await;
                }
                Some(outcome) = self.flush_rx.recv() => {
                    self.engine.complete_flush(outcome).await;
                }
                else => break,
            }
        }

        if self.engine.flush_in_flight() {
            tracing::info!("Waiting for in-flight delivery before shutdown");
            match tokio::time::timeout(SHUTDOWN_FLUSH_GRACE, self.flush_rx.recv()).await {
                Ok(Some(outcome)) => self.engine.complete_flush(outcome).await,
                _ => tracing::warn!("In-flight delivery did not report back before shutdown"),
            }
        }
        tracing::info!(current_index = self.engine.current_index(), "Crawl runner stopped");
    }

    async fn dispatch(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::Command(UiCommand::CrawlStart) => self.engine.start().await,
            ControlMessage::Command(UiCommand::CrawlStop) => self.engine.stop().await,
            ControlMessage::Command(UiCommand::RetryStop) => self.engine.stop_retry().await,
            ControlMessage::Skip(reply) => {
                let _ = reply.send(self.engine.skip_current().await);
            }
            ControlMessage::ReplaceTasks {
                tasks,
                refetched_at,
                reply,
            } => {
                self.engine.set_task_list(tasks, refetched_at).await;
                let _ = reply.send(());
            }
            ControlMessage::UpdateConfig { patch, reply } => {
                let _ = reply.send(self.engine.update_config(&patch).await);
            }
            ControlMessage::Status(reply) => {
                let _ = reply.send(self.engine.status());
            }
            ControlMessage::TaskList(reply) => {
                let _ = reply.send(self.engine.tasks().to_vec());
            }
        }
    }
}
