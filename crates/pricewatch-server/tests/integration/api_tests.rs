use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use pricewatch_core::AppError;
use pricewatch_core::testutil::{MockTargetSource, tasks};

use crate::integration::common::{
    TestApp, json_body, setup_test_app, setup_test_app_no_auth,
};

/// Poll `/v1/status` until `check` holds.
async fn wait_for_status(app: &TestApp, check: impl Fn(&serde_json::Value) -> bool) -> serde_json::Value {
    for _ in 0..100 {
        let status = json_body(app.call("GET", "/v1/status", None).await).await;
        if check(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Status condition not reached");
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app(MockTargetSource::new(vec![])).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["engine"], "ok");
}

#[tokio::test]
async fn openapi_document_carries_package_version() {
    let app = setup_test_app(MockTargetSource::new(vec![])).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert_eq!(doc["info"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(doc["info"]["title"], "pricewatch API");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app(MockTargetSource::new(vec![])).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/v1/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_token_returns_401() {
    let app = setup_test_app(MockTargetSource::new(vec![])).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/v1/status")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_admin_token_returns_403() {
    let app = setup_test_app_no_auth().await;

    let response = app.call("GET", "/v1/status", None).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = json_body(response).await;
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn config_defaults_and_partial_update() {
    let app = setup_test_app(MockTargetSource::new(vec![])).await;

    let json = json_body(app.call("GET", "/v1/config", None).await).await;
    assert_eq!(json["batchSize"], 10);
    assert_eq!(json["interval"]["min"], 10000);

    let response = app
        .call("PUT", "/v1/config", Some(serde_json::json!({"batchSize": 5})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["batchSize"], 5);
    assert_eq!(json["interval"]["max"], 15000);
    assert_eq!(json["retry"]["max"], 3);

    let saved = app.store.snapshot().await.config.unwrap();
    assert_eq!(saved.batch_size, 5);
}

#[tokio::test]
async fn invalid_config_returns_400() {
    let app = setup_test_app(MockTargetSource::new(vec![])).await;

    let response = app
        .call(
            "PUT",
            "/v1/config",
            Some(serde_json::json!({"interval": {"min": 20000, "max": 1000}})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn refresh_targets_replaces_task_list() {
    let app = setup_test_app(MockTargetSource::new(tasks(3))).await;

    let response = app.call("POST", "/v1/targets/refresh", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["batchSize"], 10);
    assert_eq!(json["taskList"].as_array().unwrap().len(), 3);
    assert_eq!(json["taskList"][0]["skuId"], "sku-0");

    let status = json_body(app.call("GET", "/v1/status", None).await).await;
    assert_eq!(status["taskList"].as_array().unwrap().len(), 3);
    assert_eq!(status["currentIndex"], 0);
    assert!(status["refetchedAt"].as_i64().unwrap() > 0);
    assert_eq!(status["engine"]["state"], "idle");
}

#[tokio::test]
async fn failed_refresh_returns_502() {
    let app = setup_test_app(MockTargetSource::with_error(AppError::FetchListFailed(
        "Expected a JSON array of targets".into(),
    )))
    .await;

    let response = app.call("POST", "/v1/targets/refresh", None).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(response).await;
    assert_eq!(json["error"], "upstream_error");
}

#[tokio::test]
async fn start_processes_first_item() {
    let app = setup_test_app(MockTargetSource::new(tasks(3))).await;
    app.call("POST", "/v1/targets/refresh", None).await;

    let response = app.call("POST", "/v1/crawl/start", None).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["command"], "start");

    let status = wait_for_status(&app, |s| s["currentIndex"] == 1).await;
    assert_eq!(status["engine"]["isRunning"], true);
    assert_eq!(status["resultList"][0]["skuId"], "sku-0");
    assert_eq!(status["resultList"][0]["status"], "completed");
    assert_eq!(app.host.navigations().len(), 1);
}

#[tokio::test]
async fn skip_while_running_returns_409() {
    let app = setup_test_app(MockTargetSource::new(tasks(3))).await;
    app.call("POST", "/v1/targets/refresh", None).await;
    app.call("POST", "/v1/crawl/start", None).await;
    wait_for_status(&app, |s| s["currentIndex"] == 1).await;

    let response = app.call("POST", "/v1/crawl/skip", None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn stop_then_skip_advances() {
    let app = setup_test_app(MockTargetSource::new(tasks(3))).await;
    app.call("POST", "/v1/targets/refresh", None).await;
    app.call("POST", "/v1/crawl/start", None).await;
    wait_for_status(&app, |s| s["currentIndex"] == 1).await;

    let response = app.call("POST", "/v1/crawl/stop", None).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    wait_for_status(&app, |s| s["engine"]["isRunning"] == false).await;

    let response = app.call("POST", "/v1/crawl/skip", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let status = wait_for_status(&app, |s| s["currentIndex"] == 2).await;
    assert_eq!(status["resultList"][1]["skuId"], "sku-1");
    assert_eq!(status["resultList"][1]["status"], "failed");
    assert!(app.delivery.payloads().is_empty());
}
