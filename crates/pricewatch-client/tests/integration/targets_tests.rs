use pricewatch_client::ReqwestTargetSource;
use pricewatch_core::error::AppError;
use pricewatch_core::traits::TargetSource;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::integration::common::start_server;

#[tokio::test]
async fn fetches_task_array() {
    let server = start_server().await;
    Mock::given(method("GET"))
        .and(path("/collect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"skuId": "sku-1", "productId": "100", "vendorItemId": "200"},
            {"skuId": "sku-2", "productId": "101"}
        ])))
        .mount(&server)
        .await;

    let source = ReqwestTargetSource::new(format!("{}/collect", server.uri())).unwrap();
    let tasks = source.fetch_targets().await.unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].vendor_item_id, "200");
    assert!(tasks[1].validate().is_err());
}

#[tokio::test]
async fn non_array_body_is_rejected() {
    let server = start_server().await;
    Mock::given(method("GET"))
        .and(path("/collect"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "maintenance"})),
        )
        .mount(&server)
        .await;

    let source = ReqwestTargetSource::new(format!("{}/collect", server.uri())).unwrap();
    let err = source.fetch_targets().await.unwrap_err();
    assert!(matches!(err, AppError::FetchListFailed(_)));
}

#[tokio::test]
async fn server_error_is_rejected() {
    let server = start_server().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = ReqwestTargetSource::new(format!("{}/collect", server.uri())).unwrap();
    let err = source.fetch_targets().await.unwrap_err();
    assert!(err.to_string().contains("503"));
}
