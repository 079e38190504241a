// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict endpoint response types

use serde::{Deserialize, Serialize};

/// Response for a successful detection request.
///
/// `boxes` and `scores` are the filtered, index-aligned prediction arrays;
/// `result_image` is the public URL of the annotated PNG.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub result_image: String,
    pub boxes: Vec<[f32; 4]>,
    pub scores: Vec<f32>,
}
