use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use pricewatch_core::events::TracingNotifier;
use pricewatch_core::testutil::{
    MemoryCheckpointStore, MemoryScheduleStore, MockDelivery, MockHost, MockTargetSource,
};
use pricewatch_core::{CrawlConfig, CrawlEvent, CrawlerDeps, EngineOptions, launch};
use pricewatch_server::routes;
use pricewatch_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

pub struct TestApp {
    pub router: Router,
    pub host: MockHost,
    pub delivery: MockDelivery,
    pub store: MemoryCheckpointStore,
    pub events: broadcast::Sender<CrawlEvent>,
    shutdown: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl TestApp {
    /// Send `request` with the test bearer token attached.
    pub async fn call(&self, method: &str, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TEST_API_KEY}"));
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Launch a crawler on in-memory mocks and wrap it in the API router.
pub async fn setup_test_app_with(targets: MockTargetSource, admin_token: Option<&str>) -> TestApp {
    let host = MockHost::new();
    let delivery = MockDelivery::new();
    let store = MemoryCheckpointStore::default();
    let (events, _) = broadcast::channel(64);
    let shutdown = CancellationToken::new();

    let deps = CrawlerDeps {
        host: host.clone(),
        store: store.clone(),
        schedule_store: MemoryScheduleStore::default(),
        delivery: delivery.clone(),
        targets,
        events: Arc::new(events.clone()),
        notifier: Arc::new(TracingNotifier),
    };
    let options = EngineOptions {
        extract_timeout: Duration::from_millis(500),
        ..EngineOptions::default()
    };
    let crawler = launch(deps, CrawlConfig::default(), options, shutdown.clone())
        .await
        .expect("Failed to launch crawler");

    let state = Arc::new(AppState {
        crawler: crawler.controller.clone(),
        events: events.clone(),
        admin_token: admin_token.map(str::to_string),
        shutdown: shutdown.clone(),
    });

    TestApp {
        router: routes::router(state),
        host,
        delivery,
        store,
        events,
        shutdown,
    }
}

pub async fn setup_test_app(targets: MockTargetSource) -> TestApp {
    setup_test_app_with(targets, Some(TEST_API_KEY)).await
}

pub async fn setup_test_app_no_auth() -> TestApp {
    setup_test_app_with(MockTargetSource::new(vec![]), None).await
}
