// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection
//!
//! The detector is loaded once at process start and shared read-only across
//! all requests. `Detector` is the seam request handlers depend on, so tests
//! can inject a `StaticDetector` instead of real ONNX weights.

pub mod onnx_detector;
pub mod static_detector;

pub use onnx_detector::OnnxDetector;
pub use static_detector::StaticDetector;

use anyhow::Result;
use image::DynamicImage;

/// One batch of predictions for a single image.
///
/// `boxes` and `scores` are always the same length and index-aligned:
/// `scores[i]` is the confidence for `boxes[i]`. Boxes are absolute pixel
/// coordinates `[xmin, ymin, xmax, ymax]`, scores are in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prediction {
    pub boxes: Vec<[f32; 4]>,
    pub scores: Vec<f32>,
}

impl Prediction {
    pub fn new(boxes: Vec<[f32; 4]>, scores: Vec<f32>) -> Self {
        debug_assert_eq!(boxes.len(), scores.len());
        Self { boxes, scores }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Keeps only predictions with `score >= threshold`, preserving the
    /// box/score alignment.
    pub fn retain_above(&self, threshold: f32) -> Prediction {
        let mut boxes = Vec::new();
        let mut scores = Vec::new();
        for (b, s) in self.boxes.iter().zip(self.scores.iter()) {
            if *s >= threshold {
                boxes.push(*b);
                scores.push(*s);
            }
        }
        Prediction { boxes, scores }
    }
}

/// Detection model interface.
///
/// Implementations must be safe to share across request handlers; the
/// process owns exactly one instance for its lifetime.
pub trait Detector: Send + Sync {
    /// Runs one synchronous inference over a single image. No batching.
    fn detect(&self, image: &DynamicImage) -> Result<Prediction>;

    /// Model identifier reported by the health endpoint.
    fn model_name(&self) -> &str;

    /// Number of classes the classification head predicts.
    fn num_classes(&self) -> usize;
}
