use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pricewatch_core::error::AppError;
use pricewatch_core::models::CrawlResult;
use pricewatch_core::traits::{PageHost, TabId};
use reqwest::{Client, StatusCode};

use crate::http::{build_client, map_send_error};
use crate::parser::ProductPageParser;

/// Page host that downloads product pages over plain HTTP.
///
/// Tabs are virtual: each holds the HTML of its last navigation. A 403 or
/// 429 from the marketplace is reported as an error page so the engine
/// classifies it as blocked.
#[derive(Clone)]
pub struct HttpPageHost {
    client: Client,
    parser: ProductPageParser,
    tabs: Arc<Mutex<HashMap<TabId, Option<String>>>>,
    next_tab: Arc<AtomicU64>,
    timeout_secs: u64,
}

impl HttpPageHost {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            parser: ProductPageParser::new()?,
            tabs: Arc::new(Mutex::new(HashMap::new())),
            next_tab: Arc::new(AtomicU64::new(1)),
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn close_tab(&self, tab: TabId) {
        self.lock_tabs().remove(&tab);
    }

    fn lock_tabs(&self) -> std::sync::MutexGuard<'_, HashMap<TabId, Option<String>>> {
        self.tabs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PageHost for HttpPageHost {
    async fn is_tab_alive(&self, tab: TabId) -> bool {
        self.lock_tabs().contains_key(&tab)
    }

    async fn open_blank_tab(&self) -> Result<TabId, AppError> {
        let tab = TabId(self.next_tab.fetch_add(1, Ordering::Relaxed));
        self.lock_tabs().insert(tab, None);
        tracing::debug!(%tab, "Opened virtual tab");
        Ok(tab)
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<(), AppError> {
        if !self.lock_tabs().contains_key(&tab) {
            return Err(AppError::ExtractionFailed(format!("No tab with id {tab}")));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::ExtractionBlocked(format!(
                "HTTP {} error page for {url}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;
        self.lock_tabs().insert(tab, Some(html));
        Ok(())
    }

    async fn extract(&self, tab: TabId, sku_id: &str) -> Result<CrawlResult, AppError> {
        let html = self
            .lock_tabs()
            .get(&tab)
            .cloned()
            .flatten()
            .ok_or_else(|| AppError::ExtractionFailed(format!("Nothing loaded in {tab}")))?;
        self.parser.parse(&html, sku_id)
    }
}
