use pricewatch_core::batcher::{DeliveryItem, DeliveryPayload};
use wiremock::MockServer;

pub const PRODUCT_PAGE: &str = r#"<html>
<head><title>Wireless Mouse</title></head>
<body>
  <div class="prod-atf">
    <div class="price-container">
      <span class="original-price"><span class="price-amount">32,000원</span></span>
      <span class="sales-price"><span class="price-amount">29,000원</span></span>
      <span class="final-price"><span class="price-amount">27,500원</span></span>
    </div>
  </div>
</body>
</html>"#;

pub async fn start_server() -> MockServer {
    MockServer::start().await
}

pub fn payload(is_last: bool) -> DeliveryPayload {
    DeliveryPayload {
        result: vec![DeliveryItem {
            sku_id: "sku-1".into(),
            product_id: "100".into(),
            vendor_item_id: "200".into(),
            page_title: "Wireless Mouse".into(),
            original_price: 32_000,
            sales_price: 29_000,
            final_price: 27_500,
            is_soldout: false,
            soldout_type: None,
        }],
        total_cnt: 1,
        is_last,
        success_count: is_last.then_some(1),
        failed_count: is_last.then_some(0),
    }
}
