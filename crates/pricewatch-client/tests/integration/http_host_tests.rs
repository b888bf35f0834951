use pricewatch_client::HttpPageHost;
use pricewatch_core::error::AppError;
use pricewatch_core::models::{ResultStatus, Task};
use pricewatch_core::traits::PageHost;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::integration::common::{PRODUCT_PAGE, start_server};

#[tokio::test]
async fn navigates_and_extracts_product_page() {
    let server = start_server().await;
    Mock::given(method("GET"))
        .and(path("/vp/products/100"))
        .and(query_param("vendorItemId", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_PAGE))
        .mount(&server)
        .await;

    let host = HttpPageHost::new().unwrap();
    let tab = host.open_blank_tab().await.unwrap();
    assert!(host.is_tab_alive(tab).await);

    let url = Task::new("sku-1", "100", "200")
        .product_url(&server.uri())
        .unwrap();
    host.navigate(tab, &url).await.unwrap();
    let result = host.extract(tab, "sku-1").await.unwrap();

    assert_eq!(result.status, ResultStatus::Completed);
    assert_eq!(result.product_name, "Wireless Mouse");
    assert_eq!(result.price.unwrap().final_price, 27_500);
}

#[tokio::test]
async fn forbidden_is_reported_as_blocked() {
    let server = start_server().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let host = HttpPageHost::new().unwrap();
    let tab = host.open_blank_tab().await.unwrap();
    let err = host
        .navigate(tab, &format!("{}/vp/products/1?vendorItemId=2", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExtractionBlocked(_)));
    assert!(err.is_blocked());
}

#[tokio::test]
async fn closed_tab_is_not_alive() {
    let host = HttpPageHost::new().unwrap();
    let tab = host.open_blank_tab().await.unwrap();
    host.close_tab(tab);

    assert!(!host.is_tab_alive(tab).await);
    assert!(host.extract(tab, "sku-1").await.is_err());
}

#[tokio::test]
async fn extract_before_navigation_fails() {
    let host = HttpPageHost::new().unwrap();
    let tab = host.open_blank_tab().await.unwrap();
    let err = host.extract(tab, "sku-1").await.unwrap_err();
    assert!(matches!(err, AppError::ExtractionFailed(_)));
}
