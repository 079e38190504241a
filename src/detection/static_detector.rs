// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fixed-output detector for tests and local development
//!
//! Returns the same prediction for every image, which is exactly what the
//! API tests need: deterministic boxes/scores without real weights on disk.

use anyhow::Result;
use image::DynamicImage;

use super::{Detector, Prediction};

#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    prediction: Prediction,
}

impl StaticDetector {
    pub fn new(prediction: Prediction) -> Self {
        Self { prediction }
    }

    /// Detector that never finds anything.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Detector for StaticDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Prediction> {
        Ok(self.prediction.clone())
    }

    fn model_name(&self) -> &str {
        "static"
    }

    fn num_classes(&self) -> usize {
        2
    }
}
