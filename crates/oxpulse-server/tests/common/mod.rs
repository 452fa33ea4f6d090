#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use oxpulse_aggregate::DerivedMetricProcessor;
use oxpulse_alert::engine::{AlertEngine, OngoingPolicy};
use oxpulse_buffer::MetricBuffer;
use oxpulse_server::app;
use oxpulse_server::config::ServerConfig;
use oxpulse_server::state::AppState;
use oxpulse_stream::pipeline::MetricPipeline;
use oxpulse_stream::registry::SubscriptionRegistry;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
}

/// Build a full in-memory server with no seeded rules and no background
/// tasks, suitable for `oneshot` requests.
pub fn build_test_context() -> TestContext {
    build_test_context_with_buffer(1000, 300)
}

/// Same as [`build_test_context`] with an explicit buffer shape, for
/// tests that need a retention window longer than the default.
pub fn build_test_context_with_buffer(max_size: usize, window_secs: u64) -> TestContext {
    oxpulse_common::id::init(1, 1);

    let buffer = Arc::new(Mutex::new(MetricBuffer::new(max_size, window_secs)));
    let alert_engine = Arc::new(Mutex::new(AlertEngine::new(OngoingPolicy::EveryMeasurement)));
    let derived = Arc::new(Mutex::new(DerivedMetricProcessor::new(10)));
    let registry = Arc::new(SubscriptionRegistry::new());
    let pipeline = Arc::new(MetricPipeline::new(
        buffer.clone(),
        alert_engine.clone(),
        registry.clone(),
        derived.clone(),
    ));

    let state = AppState {
        buffer,
        alert_engine,
        derived,
        registry,
        pipeline,
        start_time: Utc::now(),
        config: Arc::new(ServerConfig::default()),
    };

    let app = app::build_http_app(state.clone());
    TestContext { state, app }
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(json: &Value) -> T {
    serde_json::from_value(json["data"].clone()).expect("data should decode")
}
