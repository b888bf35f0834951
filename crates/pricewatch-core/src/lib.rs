pub mod batcher;
pub mod bootstrap;
pub mod checkpoint;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod events;
pub mod launch;
pub mod ledger;
pub mod models;
pub mod pacing;
pub mod runner;
pub mod schedule;
pub mod session;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use batcher::{DeliveryItem, DeliveryPayload};
pub use checkpoint::Checkpoint;
pub use config::{CrawlConfig, CrawlConfigPatch, Settings};
pub use engine::{CrawlEngine, EngineOptions, EngineParts, EngineState, EngineStatus};
pub use control::{Controller, CurrentStatus, TargetListRefreshed};
pub use error::AppError;
pub use events::{CrawlEvent, EventSink, Notifier, UiCommand};
pub use launch::{Crawler, CrawlerDeps, launch};
pub use models::{CrawlResult, PriceInfo, ResultSet, ResultStatus, Task};
pub use runner::{CrawlRunner, EngineHandle};
pub use schedule::{ScheduleEntry, ScheduleStore, TokioWakeScheduler, WakeScheduler};
pub use session::SessionId;
pub use traits::{CheckpointStore, PageHost, ResultDelivery, TabId, TargetSource};
