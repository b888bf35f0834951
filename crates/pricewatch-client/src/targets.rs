use std::time::Duration;

use pricewatch_core::error::AppError;
use pricewatch_core::models::Task;
use pricewatch_core::traits::TargetSource;
use reqwest::Client;

use crate::http::{build_client, map_send_error};

/// Fetches the task list from the collect endpoint.
#[derive(Clone)]
pub struct ReqwestTargetSource {
    client: Client,
    url: String,
    timeout_secs: u64,
}

impl ReqwestTargetSource {
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            timeout_secs: timeout.as_secs(),
        })
    }
}

impl TargetSource for ReqwestTargetSource {
    async fn fetch_targets(&self) -> Result<Vec<Task>, AppError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::FetchListFailed(map_send_error(e, self.timeout_secs).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchListFailed(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.url
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::FetchListFailed(format!("Invalid JSON body: {e}")))?;
        if !body.is_array() {
            return Err(AppError::FetchListFailed(
                "Expected a JSON array of targets".into(),
            ));
        }

        let tasks: Vec<Task> = serde_json::from_value(body)
            .map_err(|e| AppError::FetchListFailed(format!("Malformed target entry: {e}")))?;
        let invalid = tasks.iter().filter(|t| t.validate().is_err()).count();
        if invalid > 0 {
            tracing::warn!(%invalid, total = tasks.len(), "Target list contains incomplete entries");
        }
        Ok(tasks)
    }
}
