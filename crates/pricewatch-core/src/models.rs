use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// Default marketplace origin used to build product page addresses.
pub const DEFAULT_PRODUCT_BASE_URL: &str = "https://www.coupang.com";

/// One product lookup unit, supplied by the collect endpoint.
///
/// Fields default to empty strings so that a payload missing an identifier
/// still parses and is reported by [`Task::validate`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub sku_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub vendor_item_id: String,
}

impl Task {
    pub fn new(
        sku_id: impl Into<String>,
        product_id: impl Into<String>,
        vendor_item_id: impl Into<String>,
    ) -> Self {
        Self {
            sku_id: sku_id.into(),
            product_id: product_id.into(),
            vendor_item_id: vendor_item_id.into(),
        }
    }

    /// Check that all three identifying fields are present.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.sku_id.trim().is_empty() {
            return Err(AppError::MissingParameter("skuId"));
        }
        if self.product_id.trim().is_empty() {
            return Err(AppError::MissingParameter("productId"));
        }
        if self.vendor_item_id.trim().is_empty() {
            return Err(AppError::MissingParameter("vendorItemId"));
        }
        Ok(())
    }

    /// Product page address: `<base>/vp/products/<productId>?vendorItemId=<vendorItemId>`.
    pub fn product_url(&self, base: &str) -> Result<String, AppError> {
        let mut url = Url::parse(base)
            .map_err(|e| AppError::ConfigError(format!("Invalid product base URL '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::ConfigError(format!("Product base URL '{base}' cannot be a base")))?
            .pop_if_empty()
            .extend(["vp", "products", self.product_id.as_str()]);
        url.query_pairs_mut()
            .append_pair("vendorItemId", &self.vendor_item_id);
        Ok(url.to_string())
    }
}

/// Prices scraped from a product page, in the marketplace's minor-free unit (KRW).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub original: u64,
    pub sales: u64,
    #[serde(rename = "final")]
    pub final_price: u64,
}

/// Lifecycle status of a single result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStatus {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "out-of-stock-temporary", alias = "out-of-stock--temporary")]
    OutOfStockTemporary,
    #[serde(rename = "out-of-stock-permanent", alias = "out-of-stock--permanent")]
    OutOfStockPermanent,
    /// Acknowledged by the remote endpoint.
    #[serde(rename = "sent")]
    Sent,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
            ResultStatus::OutOfStockTemporary => "out-of-stock-temporary",
            ResultStatus::OutOfStockPermanent => "out-of-stock-permanent",
            ResultStatus::Sent => "sent",
        }
    }

    pub fn is_sold_out(&self) -> bool {
        matches!(
            self,
            ResultStatus::OutOfStockTemporary | ResultStatus::OutOfStockPermanent
        )
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one product lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub sku_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceInfo>,
    pub status: ResultStatus,
    #[serde(default)]
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn completed(sku_id: impl Into<String>, price: PriceInfo, product_name: impl Into<String>) -> Self {
        Self {
            sku_id: sku_id.into(),
            price: Some(price),
            status: ResultStatus::Completed,
            product_name: product_name.into(),
            error: None,
        }
    }

    pub fn failed(sku_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            sku_id: sku_id.into(),
            price: None,
            status: ResultStatus::Failed,
            product_name: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Results keyed by SKU, in first-seen order. Upserts are last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<CrawlResult>);

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, result: CrawlResult) {
        match self.0.iter_mut().find(|r| r.sku_id == result.sku_id) {
            Some(existing) => *existing = result,
            None => self.0.push(result),
        }
    }

    /// Mark every listed SKU as acknowledged. Unknown SKUs are ignored.
    pub fn mark_sent<'a>(&mut self, sku_ids: impl IntoIterator<Item = &'a str>) {
        for sku_id in sku_ids {
            if let Some(existing) = self.0.iter_mut().find(|r| r.sku_id == sku_id) {
                existing.status = ResultStatus::Sent;
            }
        }
    }

    /// Drop every result that was never acknowledged by the endpoint.
    pub fn retain_sent(&mut self) {
        self.0.retain(|r| r.status == ResultStatus::Sent);
    }

    pub fn sent_count(&self) -> usize {
        self.0
            .iter()
            .filter(|r| r.status == ResultStatus::Sent)
            .count()
    }

    pub fn get(&self, sku_id: &str) -> Option<&CrawlResult> {
        self.0.iter().find(|r| r.sku_id == sku_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CrawlResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_slice(&self) -> &[CrawlResult] {
        &self.0
    }
}

impl From<Vec<CrawlResult>> for ResultSet {
    fn from(results: Vec<CrawlResult>) -> Self {
        let mut set = ResultSet::new();
        for result in results {
            set.upsert(result);
        }
        set
    }
}

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
