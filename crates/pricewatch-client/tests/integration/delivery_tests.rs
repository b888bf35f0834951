use pricewatch_client::ReqwestDelivery;
use pricewatch_core::error::AppError;
use pricewatch_core::traits::ResultDelivery;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::integration::common::{payload, start_server};

#[tokio::test]
async fn posts_batch_as_json() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path("/crawler/price"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "totalCnt": 1,
            "isLast": true,
            "successCount": 1,
            "failedCount": 0,
            "result": [{"sku_id": "sku-1", "final_price": 27500, "soldout_type": null}]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let delivery = ReqwestDelivery::new(format!("{}/crawler/price", server.uri())).unwrap();
    delivery.deliver(&payload(true)).await.unwrap();
}

#[tokio::test]
async fn non_success_status_is_a_failed_delivery() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let delivery = ReqwestDelivery::new(format!("{}/crawler/price", server.uri())).unwrap();
    let err = delivery.deliver(&payload(false)).await.unwrap_err();
    assert!(matches!(err, AppError::DeliveryFailed(ref msg) if msg.contains("500")));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_failed_delivery() {
    let delivery = ReqwestDelivery::new("http://127.0.0.1:9/crawler/price").unwrap();
    let err = delivery.deliver(&payload(false)).await.unwrap_err();
    assert!(matches!(err, AppError::DeliveryFailed(_)));
}
