use pricewatch_core::models::{CrawlResult, PriceInfo, ResultStatus, Task};
use pricewatch_store::{StateDir, StoreConfig};
use tempfile::TempDir;

/// Opens a state directory inside a fresh temp dir.
///
/// The `TempDir` must be kept in scope for the test duration;
/// dropping it deletes the directory.
pub async fn setup_state_dir() -> (StateDir, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let dir = StateDir::open(&StoreConfig::new(tmp.path().join("state")))
        .await
        .expect("Failed to open state dir");
    (dir, tmp)
}

pub fn tasks(n: usize) -> Vec<Task> {
    (0..n)
        .map(|i| Task::new(format!("sku-{i}"), format!("{}", 100 + i), format!("{}", 200 + i)))
        .collect()
}

pub fn result(sku: &str, status: ResultStatus) -> CrawlResult {
    CrawlResult {
        sku_id: sku.into(),
        price: Some(PriceInfo {
            original: 1_000,
            sales: 900,
            final_price: 850,
        }),
        status,
        product_name: "Item".into(),
        error: None,
    }
}
