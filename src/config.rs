// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! All knobs that were implicit in earlier prototypes are explicit here and
//! read from environment variables (a `.env` file is honored via dotenv).
//! Tests construct `ServiceConfig` directly with an overridden upload
//! directory instead of touching the environment.

use anyhow::Result;
use std::env;
use std::path::PathBuf;

/// Public URL prefix under which the upload directory is served.
pub const PUBLIC_UPLOAD_PREFIX: &str = "/static/uploads";

/// Runtime configuration for the detection service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path to the exported ONNX detection model
    pub model_path: PathBuf,

    /// Number of classes the exported classification head predicts
    /// (background included)
    pub num_classes: usize,

    /// Confidence threshold applied both when filtering predictions and
    /// when drawing them
    pub threshold: f32,

    /// Directory holding raw uploads and annotated outputs
    pub upload_dir: PathBuf,

    /// HTTP bind port
    pub api_port: u16,

    /// Optional TTF font used for score labels; without it the annotator
    /// draws rectangles only
    pub font_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/fasterrcnn.onnx"),
            num_classes: 2,
            threshold: 0.5,
            upload_dir: PathBuf::from("static/uploads"),
            api_port: 8080,
            font_path: None,
        }
    }
}

impl ServiceConfig {
    /// Builds the configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// # Errors
    /// Returns an error if `DETECT_THRESHOLD` is outside `[0, 1]` or
    /// `DETECT_NUM_CLASSES` is below 2 — both are startup errors, not
    /// something to silently correct.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let model_path = env::var("DETECT_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let num_classes = env::var("DETECT_NUM_CLASSES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.num_classes);

        let threshold = env::var("DETECT_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(defaults.threshold);

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);

        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.api_port);

        let font_path = env::var("DETECT_FONT_PATH").ok().map(PathBuf::from);

        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!(
                "DETECT_THRESHOLD must be within [0, 1], got {}",
                threshold
            );
        }
        if num_classes < 2 {
            anyhow::bail!(
                "DETECT_NUM_CLASSES must be at least 2 (background + 1), got {}",
                num_classes
            );
        }

        Ok(Self {
            model_path,
            num_classes,
            threshold,
            upload_dir,
            api_port,
            font_path,
        })
    }

    /// URL under which a file in the upload directory is reachable.
    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", PUBLIC_UPLOAD_PREFIX, filename)
    }
}
