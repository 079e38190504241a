// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::response::PredictResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::decode_image_bytes;

/// POST /predict - Run object detection on an uploaded image
///
/// Accepts a multipart form with an `image` file field and returns the
/// annotated image URL plus the filtered boxes and scores.
///
/// # Errors
/// - 400 Bad Request: no `image` field, empty filename, malformed multipart
/// - 500 Internal Server Error: decode, inference, render or file IO failure
pub async fn predict_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    // 1. Pull the image field out of the form
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {}", e)))?;
            upload = Some((filename, data.to_vec()));
            break;
        }
    }

    let (filename, data) = upload.ok_or_else(|| {
        warn!("Predict request without an image field");
        ApiError::InvalidRequest("No file uploaded".to_string())
    })?;
    if filename.is_empty() {
        warn!("Predict request with empty filename");
        return Err(ApiError::InvalidRequest("No file selected".to_string()));
    }

    debug!("Received upload '{}' ({} bytes)", filename, data.len());

    // 2. Persist the raw upload under a random name
    let raw_name = format!("{}.jpg", Uuid::new_v4().simple());
    let raw_path = state.config.upload_dir.join(&raw_name);
    tokio::fs::write(&raw_path, &data)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to save upload: {}", e)))?;

    // 3. Decode and hand the image to the detector
    let (image, image_info) = decode_image_bytes(&data)
        .map_err(|e| ApiError::InternalError(format!("Failed to decode image: {}", e)))?;
    debug!(
        "Decoded image: {}x{}, format {:?}",
        image_info.width, image_info.height, image_info.format
    );

    // 4. One synchronous inference, no batching
    let prediction = state
        .detector
        .detect(&image)
        .map_err(|e| ApiError::InternalError(format!("Inference failed: {}", e)))?;

    // 5. Filter by the configured threshold; alignment is preserved
    let threshold = state.config.threshold;
    let filtered = prediction.retain_above(threshold);
    info!(
        "Detection complete: {} of {} predictions at threshold {}",
        filtered.len(),
        prediction.len(),
        threshold
    );

    // 6. Render and persist the annotated PNG
    let annotated = state
        .annotator
        .render(&image, &filtered, threshold)
        .map_err(|e| ApiError::InternalError(format!("Annotation failed: {}", e)))?;

    let out_name = format!("annotated_{}.png", Uuid::new_v4().simple());
    let out_path = state.config.upload_dir.join(&out_name);
    tokio::fs::write(&out_path, &annotated)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to save annotated image: {}", e)))?;

    // 7. Respond with the public URL and the filtered arrays
    Ok(Json(PredictResponse {
        result_image: state.config.public_url(&out_name),
        boxes: filtered.boxes,
        scores: filtered.scores,
    }))
}
