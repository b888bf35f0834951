use std::time::Duration;

use pricewatch_core::batcher::DeliveryPayload;
use pricewatch_core::error::AppError;
use pricewatch_core::traits::ResultDelivery;
use reqwest::Client;

use crate::http::{build_client, map_send_error};

/// Posts result batches as JSON. Anything but a 2xx is a failed delivery.
#[derive(Clone)]
pub struct ReqwestDelivery {
    client: Client,
    url: String,
    timeout_secs: u64,
}

impl ReqwestDelivery {
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

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ResultDelivery for ReqwestDelivery {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| match map_send_error(e, self.timeout_secs) {
                AppError::Timeout(secs) => AppError::Timeout(secs),
                other => AppError::DeliveryFailed(other.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::DeliveryFailed(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.url
            )));
        }

        tracing::debug!(
            url = %self.url,
            count = payload.result.len(),
            is_last = payload.is_last,
            "Batch accepted"
        );
        Ok(())
    }
}
