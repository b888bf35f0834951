use serde::{Deserialize, Serialize};

use pricewatch_core::config::{CrawlConfigPatch, IntervalPatch, RetryPatch};
use pricewatch_core::{
    CrawlConfig, CrawlResult, CurrentStatus, EngineStatus, PriceInfo, TargetListRefreshed, Task,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IntervalDto {
    /// Milliseconds.
    pub min: u64,
    /// Milliseconds.
    pub max: u64,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RetryDto {
    pub max: u32,
    /// Milliseconds.
    pub interval: u64,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub batch_size: usize,
    pub interval: IntervalDto,
    pub retry: RetryDto,
}

impl From<CrawlConfig> for ConfigResponse {
    fn from(config: CrawlConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            interval: IntervalDto {
                min: config.interval.min,
                max: config.interval.max,
            },
            retry: RetryDto {
                max: config.retry.max,
                interval: config.retry.interval,
            },
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IntervalPatchDto {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RetryPatchDto {
    pub max: Option<u32>,
    pub interval: Option<u64>,
}

/// Partial update; absent or zero fields keep their current value.
#[derive(Debug, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    pub batch_size: Option<usize>,
    pub interval: Option<IntervalPatchDto>,
    pub retry: Option<RetryPatchDto>,
}

impl From<UpdateConfigRequest> for CrawlConfigPatch {
    fn from(req: UpdateConfigRequest) -> Self {
        Self {
            batch_size: req.batch_size,
            interval: req.interval.map(|i| IntervalPatch {
                min: i.min,
                max: i.max,
            }),
            retry: req.retry.map(|r| RetryPatch {
                max: r.max,
                interval: r.interval,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub sku_id: String,
    pub product_id: String,
    pub vendor_item_id: String,
}

impl From<Task> for TaskDto {
    fn from(task: Task) -> Self {
        Self {
            sku_id: task.sku_id,
            product_id: task.product_id,
            vendor_item_id: task.vendor_item_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PriceDto {
    pub original: u64,
    pub sales: u64,
    #[serde(rename = "final")]
    pub final_price: u64,
}

impl From<PriceInfo> for PriceDto {
    fn from(price: PriceInfo) -> Self {
        Self {
            original: price.original,
            sales: price.sales,
            final_price: price.final_price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultDto {
    pub sku_id: String,
    pub price: Option<PriceDto>,
    /// `completed`, `failed`, `out-of-stock-temporary`, `out-of-stock-permanent` or `sent`.
    pub status: String,
    pub product_name: String,
    pub error: Option<String>,
}

impl From<CrawlResult> for ResultDto {
    fn from(result: CrawlResult) -> Self {
        Self {
            sku_id: result.sku_id,
            price: result.price.map(Into::into),
            status: result.status.as_str().to_string(),
            product_name: result.product_name,
            error: result.error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusResponse {
    /// `idle`, `running`, `retry_waiting`, `stopped` or `exhausted`.
    pub state: String,
    pub is_running: bool,
    pub current_index: usize,
    pub total_count: usize,
    pub retry_count: u32,
    pub batch_len: usize,
    pub flush_in_flight: bool,
    pub session_id: String,
    pub last_error: Option<String>,
}

impl From<EngineStatus> for EngineStatusResponse {
    fn from(status: EngineStatus) -> Self {
        Self {
            state: status.state.as_str().to_string(),
            is_running: status.is_running,
            current_index: status.current_index,
            total_count: status.total_count,
            retry_count: status.retry_count,
            batch_len: status.batch_len,
            flush_in_flight: status.flush_in_flight,
            session_id: status.session_id.to_string(),
            last_error: status.last_error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub task_list: Vec<TaskDto>,
    pub result_list: Vec<ResultDto>,
    pub current_index: usize,
    pub batch_size: usize,
    /// Epoch milliseconds of the last target-list refresh, 0 if never.
    pub refetched_at: i64,
    pub engine: EngineStatusResponse,
}

impl From<CurrentStatus> for StatusResponse {
    fn from(status: CurrentStatus) -> Self {
        Self {
            task_list: status.task_list.into_iter().map(Into::into).collect(),
            result_list: status.result_list.into_iter().map(Into::into).collect(),
            current_index: status.current_index,
            batch_size: status.batch_size,
            refetched_at: status.refetched_at,
            engine: status.engine.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Targets & commands
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetsRefreshedResponse {
    pub batch_size: usize,
    pub task_list: Vec<TaskDto>,
}

impl From<TargetListRefreshed> for TargetsRefreshedResponse {
    fn from(refreshed: TargetListRefreshed) -> Self {
        Self {
            batch_size: refreshed.batch_size,
            task_list: refreshed.task_list.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CommandResponse {
    pub command: String,
    pub accepted: bool,
}

// ---------------------------------------------------------------------------
// Health & errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: &'static str,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
