// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod detection;
pub mod vision;

// Re-export main types
pub use api::http_server::{create_app, AppState};
pub use api::{ApiError, ErrorBody};
pub use config::ServiceConfig;
pub use detection::{Detector, OnnxDetector, Prediction, StaticDetector};
pub use vision::{Annotate, BoxAnnotator};
