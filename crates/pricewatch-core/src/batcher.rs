//! In-memory accumulation of results awaiting delivery.
//!
//! Entries carry a sequence number so a flush can remove exactly the entries
//! it covered, even when more were pushed while it was in flight. At most one
//! flush is in flight; a trigger arriving meanwhile is remembered and replayed
//! once the outcome is known.

use serde::{Deserialize, Serialize};

use crate::models::{CrawlResult, ResultStatus, Task};

#[derive(Debug, Clone, PartialEq)]
struct BatchEntry {
    seq: u64,
    result: CrawlResult,
    product_id: String,
    vendor_item_id: String,
}

/// One item of the delivery POST body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryItem {
    pub sku_id: String,
    pub product_id: String,
    pub vendor_item_id: String,
    pub page_title: String,
    pub original_price: u64,
    pub sales_price: u64,
    pub final_price: u64,
    pub is_soldout: bool,
    /// `"T"` for temporary, `"P"` for permanent, `null` otherwise.
    pub soldout_type: Option<String>,
}

impl DeliveryItem {
    fn from_entry(entry: &BatchEntry) -> Self {
        let result = &entry.result;
        let price = result.price.unwrap_or_default();
        let soldout_type = match result.status {
            ResultStatus::OutOfStockTemporary => Some("T".to_string()),
            ResultStatus::OutOfStockPermanent => Some("P".to_string()),
            _ => None,
        };
        Self {
            sku_id: result.sku_id.clone(),
            product_id: entry.product_id.clone(),
            vendor_item_id: entry.vendor_item_id.clone(),
            page_title: result.product_name.clone(),
            original_price: price.original,
            sales_price: price.sales,
            final_price: price.final_price,
            is_soldout: result.status.is_sold_out(),
            soldout_type,
        }
    }
}

/// Delivery POST body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPayload {
    pub result: Vec<DeliveryItem>,
    pub total_cnt: usize,
    pub is_last: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_count: Option<usize>,
}

/// Batch contents captured when a flush starts.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushSnapshot {
    /// Highest sequence number covered.
    pub up_to: u64,
    pub is_last: bool,
    pub results: Vec<CrawlResult>,
    pub payload: DeliveryPayload,
}

/// Result of a flush, sent back to the engine from the delivery task.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    pub snapshot: FlushSnapshot,
    /// `None` on success, the delivery error message otherwise.
    pub error: Option<String>,
}

impl FlushOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct ResultBatcher {
    entries: Vec<BatchEntry>,
    next_seq: u64,
    in_flight: bool,
    /// `Some(is_last)` when a trigger arrived during a flight.
    pending: Option<bool>,
}

impl ResultBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result, capturing the task identifiers needed on the wire.
    pub fn push(&mut self, result: CrawlResult, task: &Task) {
        self.next_seq += 1;
        self.entries.push(BatchEntry {
            seq: self.next_seq,
            result,
            product_id: task.product_id.clone(),
            vendor_item_id: task.vendor_item_id.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn results(&self) -> impl Iterator<Item = &CrawlResult> {
        self.entries.iter().map(|e| &e.result)
    }

    /// Flush trigger: the batch is full or the last item was just processed.
    pub fn should_flush(&self, batch_size: usize, is_last: bool) -> bool {
        self.entries.len() >= batch_size || is_last
    }

    /// Start a flush.
    ///
    /// Returns `None` when a flush is already in flight (the trigger is kept
    /// as pending) or there is nothing to send.
    pub fn begin_flush(&mut self, is_last: bool, total_count: usize) -> Option<FlushSnapshot> {
        if self.in_flight {
            self.pending = Some(self.pending.unwrap_or(false) || is_last);
            tracing::debug!(is_last, "Flush in flight, trigger deferred");
            return None;
        }
        let up_to = self.entries.last()?.seq;

        let results: Vec<CrawlResult> = self.entries.iter().map(|e| e.result.clone()).collect();
        let (success_count, failed_count) = if is_last {
            let count = |status| results.iter().filter(|r| r.status == status).count();
            (
                Some(count(ResultStatus::Completed)),
                Some(count(ResultStatus::Failed)),
            )
        } else {
            (None, None)
        };
        let payload = DeliveryPayload {
            result: self.entries.iter().map(DeliveryItem::from_entry).collect(),
            total_cnt: total_count,
            is_last,
            success_count,
            failed_count,
        };

        self.in_flight = true;
        Some(FlushSnapshot {
            up_to,
            is_last,
            results,
            payload,
        })
    }

    /// Settle the in-flight flush. On success the covered entries are removed.
    ///
    /// Returns the deferred trigger, if one arrived during the flight.
    pub fn complete(&mut self, outcome: &FlushOutcome) -> Option<bool> {
        self.in_flight = false;
        if outcome.is_success() {
            let up_to = outcome.snapshot.up_to;
            self.entries.retain(|e| e.seq > up_to);
        }
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceInfo;

    fn task(n: usize) -> Task {
        Task::new(format!("sku-{n}"), format!("p{n}"), format!("v{n}"))
    }

    fn completed(n: usize) -> CrawlResult {
        CrawlResult::completed(
            format!("sku-{n}"),
            PriceInfo {
                original: 1000,
                sales: 900,
                final_price: 800,
            },
            format!("Product {n}"),
        )
    }

    fn outcome(snapshot: FlushSnapshot, ok: bool) -> FlushOutcome {
        FlushOutcome {
            snapshot,
            error: (!ok).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_payload_wire_shape() {
        let mut batcher = ResultBatcher::new();
        batcher.push(completed(1), &task(1));
        let mut sold_out = CrawlResult::failed("sku-2", "ignored");
        sold_out.status = ResultStatus::OutOfStockPermanent;
        sold_out.error = None;
        batcher.push(sold_out, &task(2));

        let snapshot = batcher.begin_flush(true, 7).unwrap();
        let json = serde_json::to_value(&snapshot.payload).unwrap();
        assert_eq!(json["totalCnt"], 7);
        assert_eq!(json["isLast"], true);
        assert_eq!(json["successCount"], 1);
        assert_eq!(json["failedCount"], 0);
        assert_eq!(json["result"][0]["product_id"], "p1");
        assert_eq!(json["result"][0]["final_price"], 800);
        assert_eq!(json["result"][0]["soldout_type"], serde_json::Value::Null);
        assert_eq!(json["result"][1]["original_price"], 0);
        assert_eq!(json["result"][1]["is_soldout"], true);
        assert_eq!(json["result"][1]["soldout_type"], "P");
    }

    #[test]
    fn test_counts_only_on_last_flush() {
        let mut batcher = ResultBatcher::new();
        batcher.push(completed(1), &task(1));
        let snapshot = batcher.begin_flush(false, 3).unwrap();
        let json = serde_json::to_value(&snapshot.payload).unwrap();
        assert!(json.get("successCount").is_none());
        assert!(json.get("failedCount").is_none());
    }

    #[test]
    fn test_success_removes_only_covered_entries() {
        let mut batcher = ResultBatcher::new();
        batcher.push(completed(1), &task(1));
        batcher.push(completed(2), &task(2));
        let snapshot = batcher.begin_flush(false, 10).unwrap();

        batcher.push(completed(3), &task(3));
        assert!(batcher.begin_flush(false, 10).is_none());

        let pending = batcher.complete(&outcome(snapshot, true));
        assert_eq!(pending, Some(false));
        let left: Vec<_> = batcher.results().map(|r| r.sku_id.as_str()).collect();
        assert_eq!(left, ["sku-3"]);
    }

    #[test]
    fn test_failure_keeps_batch() {
        let mut batcher = ResultBatcher::new();
        batcher.push(completed(1), &task(1));
        let snapshot = batcher.begin_flush(true, 1).unwrap();
        assert!(batcher.in_flight());

        assert_eq!(batcher.complete(&outcome(snapshot, false)), None);
        assert!(!batcher.in_flight());
        assert_eq!(batcher.len(), 1);
    }

    #[test]
    fn test_pending_trigger_ors_is_last() {
        let mut batcher = ResultBatcher::new();
        batcher.push(completed(1), &task(1));
        let snapshot = batcher.begin_flush(false, 3).unwrap();
        batcher.push(completed(2), &task(2));
        assert!(batcher.begin_flush(true, 3).is_none());
        batcher.push(completed(3), &task(3));
        assert!(batcher.begin_flush(false, 3).is_none());

        assert_eq!(batcher.complete(&outcome(snapshot, true)), Some(true));
        assert_eq!(batcher.len(), 2);
    }

    #[test]
    fn test_trigger_rule() {
        let mut batcher = ResultBatcher::new();
        assert!(!batcher.should_flush(2, false));
        assert!(batcher.should_flush(2, true));
        batcher.push(completed(1), &task(1));
        batcher.push(completed(2), &task(2));
        assert!(batcher.should_flush(2, false));
    }

    #[test]
    fn test_empty_batch_is_not_flushed() {
        let mut batcher = ResultBatcher::new();
        assert!(batcher.begin_flush(true, 0).is_none());
        assert!(!batcher.in_flight());
    }
}
