// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Route registration tests
//!
//! These tests verify that:
//! - GET / serves the upload page
//! - GET /health reports the injected detector
//! - /predict only accepts POST
//! - /predict rejects non-multipart bodies

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use detect_node::{
    api::http_server::{create_app, AppState},
    config::ServiceConfig,
    detection::StaticDetector,
    vision::BoxAnnotator,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

fn test_app(upload_dir: &std::path::Path) -> axum::Router {
    let config = ServiceConfig {
        upload_dir: upload_dir.to_path_buf(),
        ..Default::default()
    };
    create_app(AppState::new(
        Arc::new(StaticDetector::empty()),
        Arc::new(BoxAnnotator::new(None)),
        Arc::new(config),
    ))
}

#[tokio::test]
async fn test_index_serves_html() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("uploadForm"));
}

#[tokio::test]
async fn test_health_reports_detector() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["model"], "static");
    assert_eq!(health["num_classes"], 2);
}

#[tokio::test]
async fn test_predict_rejects_get() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/predict")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_predict_rejects_non_multipart_body() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"image": "zzz"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        response.status().is_client_error(),
        "expected 4xx, got {}",
        response.status()
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
