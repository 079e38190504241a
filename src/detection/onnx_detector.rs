// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX detection model wrapper
//!
//! Wraps an ONNX Runtime session around an exported Faster R-CNN graph.
//! The export already carries the resized classification head, so the
//! weights file is the single artifact the loader needs; a missing or
//! structurally incompatible file is a fatal startup error.
//!
//! Features:
//! - GPU acceleration via CUDA (with automatic CPU fallback)
//! - Single-image synchronous inference, no batching
//! - Graph-shape validation at load time

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::{Ix1, Ix2};
use ort::execution_providers::{CPU as CPUExecutionProvider, CUDA as CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Detector, Prediction};
use crate::vision::image_to_chw_tensor;

/// Faster R-CNN exports emit boxes, labels and scores in that order.
const EXPECTED_OUTPUTS: usize = 3;
const BOXES_OUTPUT: usize = 0;
const SCORES_OUTPUT: usize = 2;

/// ONNX-based object detector
///
/// # Thread Safety
/// The session requires `&mut` to run, so it sits behind a `Mutex`;
/// concurrent requests serialize on inference and nothing else. The wrapper
/// itself is immutable after load.
pub struct OnnxDetector {
    /// ONNX Runtime session (mutex for thread-safe shared access)
    session: Mutex<Session>,

    /// Name of the graph's image input, read from the session metadata
    input_name: String,

    /// Model identifier (weights file stem)
    model_name: String,

    /// Classes the classification head predicts (background included)
    num_classes: usize,
}

impl std::fmt::Debug for OnnxDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxDetector")
            .field("model_name", &self.model_name)
            .field("input_name", &self.input_name)
            .field("num_classes", &self.num_classes)
            .finish_non_exhaustive()
    }
}

impl OnnxDetector {
    /// Loads the detection model from disk.
    ///
    /// Tries the CUDA execution provider first and falls back to CPU when
    /// CUDA is unavailable; the chosen device is fixed for the process
    /// lifetime.
    ///
    /// # Errors
    /// Returns an error if:
    /// - the weights file does not exist
    /// - ONNX Runtime cannot parse or place the graph
    /// - the graph does not have the boxes/labels/scores output layout
    /// - `num_classes` is below 2
    pub fn load<P: AsRef<Path>>(model_path: P, num_classes: usize) -> Result<Self> {
        let model_path = model_path.as_ref();

        if num_classes < 2 {
            anyhow::bail!(
                "num_classes must be at least 2 (background + 1), got {}",
                num_classes
            );
        }
        if !model_path.exists() {
            anyhow::bail!(
                "detection model file not found: {}",
                model_path.display()
            );
        }

        // Try CUDA first to detect whether a GPU is actually available
        info!("Initializing detection session, attempting CUDA execution provider");
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(ort::Error::<()>::from)
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .map_err(ort::Error::<()>::from)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path);

        let session = match cuda_result {
            Ok(s) => {
                info!("CUDA execution provider initialized");
                s
            }
            Err(e) => {
                warn!("CUDA execution provider failed: {}", e);
                warn!("Falling back to CPU execution provider");
                Session::builder()
                    .context("Failed to create session builder")?
                    .with_execution_providers([CPUExecutionProvider::default().build()])
                    .map_err(ort::Error::<()>::from)
                    .context("Failed to set CPU execution provider")?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .map_err(ort::Error::<()>::from)
                    .context("Failed to set optimization level")?
                    .with_intra_threads(4)
                    .map_err(ort::Error::<()>::from)
                    .context("Failed to set intra threads")?
                    .commit_from_file(model_path)
                    .context(format!(
                        "Failed to load detection model from {}",
                        model_path.display()
                    ))?
            }
        };

        // Validate the graph shape before serving anything with it
        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .context("detection model has no inputs")?;
        if session.outputs().len() < EXPECTED_OUTPUTS {
            anyhow::bail!(
                "detection model has {} outputs, expected at least {} (boxes, labels, scores)",
                session.outputs().len(),
                EXPECTED_OUTPUTS
            );
        }

        let model_name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "detector".to_string());

        info!(
            "Detection model '{}' loaded ({} classes, input '{}')",
            model_name, num_classes, input_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            model_name,
            num_classes,
        })
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Prediction> {
        // CHW float tensor scaled to [0, 1]; the graph does its own
        // resizing and normalization internally
        let tensor = image_to_chw_tensor(image);
        debug!(
            "Running inference on {}x{} image",
            image.width(),
            image.height()
        );

        // Lock session for thread-safe access; inference is synchronous
        let mut session = self.session.lock().unwrap();
        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => Tensor::from_array(tensor)?
        ])?;

        let boxes = outputs[BOXES_OUTPUT]
            .try_extract_array::<f32>()
            .context("Failed to extract boxes output")?
            .into_dimensionality::<Ix2>()
            .context("boxes output is not [N, 4]")?
            .outer_iter()
            .map(|row| [row[0], row[1], row[2], row[3]])
            .collect::<Vec<[f32; 4]>>();

        let scores = outputs[SCORES_OUTPUT]
            .try_extract_array::<f32>()
            .context("Failed to extract scores output")?
            .into_dimensionality::<Ix1>()
            .context("scores output is not [N]")?
            .to_vec();

        if boxes.len() != scores.len() {
            anyhow::bail!(
                "model returned {} boxes but {} scores",
                boxes.len(),
                scores.len()
            );
        }

        Ok(Prediction::new(boxes, scores))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}
