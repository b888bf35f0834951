use std::time::Duration;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use tower::ServiceExt;

use pricewatch_core::CrawlEvent;
use pricewatch_core::testutil::MockTargetSource;

use crate::integration::common::setup_test_app;

#[tokio::test]
async fn event_stream_forwards_engine_events() {
    let app = setup_test_app(MockTargetSource::new(vec![])).await;

    let response = app.call("GET", "/v1/events", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    app.events
        .send(CrawlEvent::CrawlStop {
            current_index: 4,
            total_count: 9,
        })
        .unwrap();

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("No event within timeout")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

    assert!(text.contains("event: CRAWL_STOP"));
    assert!(text.contains(r#""type":"CRAWL_STOP""#));
    assert!(text.contains(r#""currentIndex":4"#));
}

#[tokio::test]
async fn event_stream_requires_auth() {
    let app = setup_test_app(MockTargetSource::new(vec![])).await;

    let response = app
        .router
        .clone()
        .oneshot(
            axum::http::Request::get("/v1/events")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
