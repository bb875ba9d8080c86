#![allow(dead_code)]

pub mod upstream;

use std::sync::Arc;

use api_server::http::{AppState, build_router};
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::Duration;
use serde_json::{Value, json};
use shared::llm::{LlmReliabilityConfig, RetryPolicy};
use shared::postcard::{InMemorySessionStore, PostcardPipeline};
use tower::ServiceExt;

use upstream::{MultipartBody, StubUpstream, png_bytes};

pub const MAX_PHOTO_BYTES: usize = 256 * 1024;
const MAX_REQUEST_BYTES: usize = 4 * MAX_PHOTO_BYTES;

pub struct TestApp {
    pub router: axum::Router,
    pub upstream: Arc<StubUpstream>,
    pub sessions: Arc<InMemorySessionStore>,
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(LlmReliabilityConfig {
        retry: RetryPolicy::single_attempt(),
        ..LlmReliabilityConfig::default()
    })
}

pub fn build_test_app_with(reliability: LlmReliabilityConfig) -> TestApp {
    let upstream = StubUpstream::new();
    let sessions = Arc::new(InMemorySessionStore::new(Duration::hours(1)));
    let pipeline = PostcardPipeline::new(
        upstream.clone(),
        upstream.clone(),
        sessions.clone(),
        reliability,
        MAX_PHOTO_BYTES,
    );

    let router = build_router(AppState {
        pipeline: Arc::new(pipeline),
        max_request_bytes: MAX_REQUEST_BYTES,
    });

    TestApp {
        router,
        upstream,
        sessions,
    }
}

pub struct JsonResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: &axum::Router, request: Request<Body>) -> JsonResponse {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should succeed");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    let body = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}));

    JsonResponse {
        status,
        headers,
        body,
    }
}

pub fn multipart_request(form: MultipartBody) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/pipeline")
        .header(header::CONTENT_TYPE, MultipartBody::content_type())
        .body(Body::from(form.finish()))
        .expect("request should build")
}

pub fn json_request(method: Method, uri: &str, json_body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match json_body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build"),
        None => builder.body(Body::empty()).expect("request should build"),
    }
}

pub fn error_code(body: &Value) -> Option<&str> {
    body.get("error_code").and_then(Value::as_str)
}

/// Runs the full pipeline for two Rome photos and returns the new session id.
pub async fn create_rome_session(app: &TestApp) -> String {
    let photo = png_bytes();
    let response = send(
        &app.router,
        multipart_request(
            MultipartBody::new()
                .file("files", "forum.png", "image/png", &photo)
                .file("files", "trattoria.png", "image/png", &photo)
                .text("location_label", "Rome, Fall 2024")
                .text("art_style", "watercolor")
                .text("caption_tone", "dramatic"),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "body: {}", response.body);

    response.body["session_id"]
        .as_str()
        .expect("session id should be present")
        .to_string()
}
