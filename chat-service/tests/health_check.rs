mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chat_service::services::metrics::init_metrics;
use chat_service::services::providers::mock::MockTextProvider;
use chat_service::services::ModelClient;
use chat_service::startup::{build_router, AppState};
use common::{test_config, TestApp};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

#[tokio::test]
async fn health_check_reports_fallback_mode() {
    let app = build_router(AppState::new(test_config(), ModelClient::disabled()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "chat-service");
    assert_eq!(body["model"], "fallback");
}

#[tokio::test]
async fn health_check_names_configured_provider() {
    let app = TestApp::spawn_with_provider(Arc::new(MockTextProvider::echoing())).await;

    let body = app.get_json("/health").await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "mock");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = build_router(AppState::new(test_config(), ModelClient::disabled()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn metrics_endpoint_exposes_routing_counters() {
    init_metrics();
    let app = TestApp::spawn().await;
    app.chat("My bill at 12345 is wrong", None).await;

    let body = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("chat_routing_decisions_total"));
    assert!(body.contains("http_requests_total"));
}

#[tokio::test]
async fn readiness_follows_provider_health() {
    let ready = build_router(AppState::new(test_config(), ModelClient::disabled()));
    let response = ready
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let broken = TestApp::spawn_with_provider(Arc::new(MockTextProvider::failing())).await;
    let response = broken
        .client
        .get(format!("{}/ready", broken.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 503);
}
