use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::DEFAULT_PRODUCT_BASE_URL;
use crate::pacing::IntervalConfig;

/// Retry policy for a failing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before the crawl halts on the item.
    pub max: u32,
    /// Delay before a retry attempt, in milliseconds.
    pub interval: u64,
}

impl RetryPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }
}

impl Default for RetryPolicy {
    /// Three attempts, ten minutes apart.
    fn default() -> Self {
        Self {
            max: 3,
            interval: 10 * 60 * 1000,
        }
    }
}

/// Crawl tuning, persisted under the `config` checkpoint key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlConfig {
    /// Items per flush.
    pub batch_size: usize,
    pub interval: IntervalConfig,
    pub retry: RetryPolicy,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            interval: IntervalConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::ConfigError("batchSize must be at least 1".into()));
        }
        self.interval.validate()
    }

    /// Merge a partial update. Absent or zero fields keep their current value.
    pub fn apply(&self, patch: &CrawlConfigPatch) -> Result<Self, AppError> {
        fn pick<T: Copy + PartialEq + Default>(patch: Option<T>, current: T) -> T {
            match patch {
                Some(v) if v != T::default() => v,
                _ => current,
            }
        }

        let interval = patch.interval.unwrap_or_default();
        let retry = patch.retry.unwrap_or_default();
        let merged = Self {
            batch_size: pick(patch.batch_size, self.batch_size),
            interval: IntervalConfig {
                min: pick(interval.min, self.interval.min),
                max: pick(interval.max, self.interval.max),
            },
            retry: RetryPolicy {
                max: pick(retry.max, self.retry.max),
                interval: pick(retry.interval, self.retry.interval),
            },
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial crawl configuration as sent by the panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlConfigPatch {
    pub batch_size: Option<usize>,
    pub interval: Option<IntervalPatch>,
    pub retry: Option<RetryPatch>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalPatch {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPatch {
    pub max: Option<u32>,
    pub interval: Option<u64>,
}

impl From<CrawlConfig> for CrawlConfigPatch {
    fn from(config: CrawlConfig) -> Self {
        Self {
            batch_size: Some(config.batch_size),
            interval: Some(IntervalPatch {
                min: Some(config.interval.min),
                max: Some(config.interval.max),
            }),
            retry: Some(RetryPatch {
                max: Some(config.retry.max),
                interval: Some(config.retry.interval),
            }),
        }
    }
}

/// Remote endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    /// Base URL of the collect API; the task list is served at `<server>/collect`.
    pub server: String,
    /// Endpoint receiving result batches.
    pub delivery_url: String,
}

impl ApiSettings {
    pub fn collect_url(&self) -> String {
        format!("{}/collect", self.server.trim_end_matches('/'))
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            server: "http://localhost:8080".to_string(),
            delivery_url: "http://localhost:8080/crawler/price".to_string(),
        }
    }
}

/// Bundled settings file (`config/settings.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub crawling: CrawlConfig,
    #[serde(default = "default_product_base_url")]
    pub product_base_url: String,
    /// Upper bound for one navigate + extract round trip.
    #[serde(default = "default_extract_timeout_secs")]
    pub extract_timeout_secs: u64,
}

fn default_product_base_url() -> String {
    DEFAULT_PRODUCT_BASE_URL.to_string()
}

fn default_extract_timeout_secs() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            crawling: CrawlConfig::default(),
            product_base_url: default_product_base_url(),
            extract_timeout_secs: default_extract_timeout_secs(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Settings file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.crawling.validate()?;
        if self.extract_timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "extractTimeoutSecs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }
}
