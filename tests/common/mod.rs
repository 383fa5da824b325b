//! Shared helpers for the integration tests: an in-memory app and request
//! plumbing for `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use library_catalog::{api, config::AppConfig, repository::MemoryRepository, AppState};

pub const LIBRARY: &str = "unity-public";
pub const OTHER_LIBRARY: &str = "riverside";

const BOUNDARY: &str = "catalog-test-boundary";

/// Router over a fresh memory store holding two libraries
pub async fn app() -> (Router, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::new());
    repository.add_library(LIBRARY).await;
    repository.add_library(OTHER_LIBRARY).await;
    let state = AppState::new(AppConfig::default(), repository.clone());
    (api::router(state), repository)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn send_json(app: &Router, method: Method, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Posts `csv` as the multipart field `field`.
pub async fn upload(app: &Router, uri: &str, field: &str, csv: &str) -> (StatusCode, Value) {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"table.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = BOUNDARY,
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub fn items_uri(library: &str) -> String {
    format!("/api/v1/libraries/{}/items", library)
}
