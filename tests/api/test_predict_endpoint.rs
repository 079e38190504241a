// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end tests for POST /predict
//!
//! These tests drive the real router with a StaticDetector (deterministic
//! predictions, no weights on disk) and a temporary upload directory per
//! test, and verify:
//! - input validation errors and their exact JSON bodies
//! - box/score filtering, alignment and determinism
//! - that the returned result_image resolves to a readable PNG on disk

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use detect_node::{
    api::http_server::{create_app, AppState},
    api::{ErrorBody, PredictResponse},
    config::ServiceConfig,
    detection::{Prediction, StaticDetector},
    vision::BoxAnnotator,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::{io::Cursor, path::Path, sync::Arc};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "X-DETECT-NODE-TEST-BOUNDARY";
const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// Helper: AppState with an injected detector and upload directory
fn test_state(detector: StaticDetector, upload_dir: &Path) -> AppState {
    let config = ServiceConfig {
        upload_dir: upload_dir.to_path_buf(),
        ..Default::default()
    };
    AppState::new(
        Arc::new(detector),
        Arc::new(BoxAnnotator::new(None)),
        Arc::new(config),
    )
}

/// Helper: detector with one prediction above and one below the threshold
fn mixed_detector() -> StaticDetector {
    StaticDetector::new(Prediction::new(
        vec![[10.0, 10.0, 50.0, 50.0], [5.0, 5.0, 20.0, 20.0]],
        vec![0.9, 0.3],
    ))
}

/// Helper: a small all-black PNG upload
fn black_png() -> Vec<u8> {
    let img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Helper: hand-rolled multipart body with a single field
fn multipart_body(
    field: &str,
    filename: Option<&str>,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    let disposition = match filename {
        Some(name) => format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, name
        ),
        None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", field),
    };
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn predict_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_image_field_returns_400() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(mixed_detector(), dir.path()));

    let body = multipart_body("payload", Some("photo.png"), "image/png", &black_png());
    let response = app.oneshot(predict_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorBody = read_json(response).await;
    assert_eq!(error.error, "No file uploaded");
}

#[tokio::test]
async fn test_empty_filename_returns_400() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(mixed_detector(), dir.path()));

    let body = multipart_body("image", Some(""), "image/png", &black_png());
    let response = app.oneshot(predict_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorBody = read_json(response).await;
    assert_eq!(error.error, "No file selected");
}

#[tokio::test]
async fn test_valid_upload_filters_and_aligns_predictions() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(mixed_detector(), dir.path()));

    let body = multipart_body("image", Some("scene.png"), "image/png", &black_png());
    let response = app.oneshot(predict_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result: PredictResponse = read_json(response).await;

    // The 0.3 prediction is filtered out, alignment preserved
    assert_eq!(result.boxes.len(), result.scores.len());
    assert_eq!(result.boxes.len(), 1);
    assert!(result.scores.iter().all(|s| *s >= 0.5));
    assert_eq!(result.boxes[0], [10.0, 10.0, 50.0, 50.0]);
}

#[tokio::test]
async fn test_result_image_is_readable_png_on_disk() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(mixed_detector(), dir.path()));

    let body = multipart_body("image", Some("scene.png"), "image/png", &black_png());
    let response = app.oneshot(predict_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result: PredictResponse = read_json(response).await;

    let filename = result
        .result_image
        .strip_prefix("/static/uploads/")
        .expect("result_image should live under the public upload prefix");
    assert!(filename.starts_with("annotated_"));
    assert!(filename.ends_with(".png"));

    let saved = std::fs::read(dir.path().join(filename)).unwrap();
    assert_eq!(&saved[..4], &PNG_MAGIC);

    // The raw upload was persisted too, as a .jpg-named file
    let raw_uploads: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".jpg"))
        .collect();
    assert_eq!(raw_uploads.len(), 1);
}

#[tokio::test]
async fn test_result_image_served_over_http() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(mixed_detector(), dir.path()));

    let body = multipart_body("image", Some("scene.png"), "image/png", &black_png());
    let response = app
        .clone()
        .oneshot(predict_request(body))
        .await
        .unwrap();
    let result: PredictResponse = read_json(response).await;

    let fetch = Request::builder()
        .method(Method::GET)
        .uri(&result.result_image)
        .body(Body::empty())
        .unwrap();
    let served = app.oneshot(fetch).await.unwrap();

    assert_eq!(served.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(served.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..4], &PNG_MAGIC);
}

#[tokio::test]
async fn test_repeat_upload_same_predictions_distinct_files() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(mixed_detector(), dir.path()));

    let mut results = Vec::new();
    for _ in 0..2 {
        let body = multipart_body("image", Some("scene.png"), "image/png", &black_png());
        let response = app
            .clone()
            .oneshot(predict_request(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        results.push(read_json::<PredictResponse>(response).await);
    }

    // Deterministic predictions, random non-colliding output names
    assert_eq!(results[0].boxes, results[1].boxes);
    assert_eq!(results[0].scores, results[1].scores);
    assert_ne!(results[0].result_image, results[1].result_image);
}

#[tokio::test]
async fn test_empty_detection_returns_empty_arrays() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(StaticDetector::empty(), dir.path()));

    let body = multipart_body("image", Some("scene.png"), "image/png", &black_png());
    let response = app.oneshot(predict_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result: PredictResponse = read_json(response).await;
    assert!(result.boxes.is_empty());
    assert!(result.scores.is_empty());
}

#[tokio::test]
async fn test_corrupt_image_returns_500_json_error() {
    let dir = TempDir::new().unwrap();
    let app = create_app(test_state(mixed_detector(), dir.path()));

    let body = multipart_body("image", Some("junk.jpg"), "image/jpeg", b"not an image");
    let response = app.oneshot(predict_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorBody = read_json(response).await;
    assert!(
        error.error.contains("decode"),
        "unexpected error message: {}",
        error.error
    );
}
