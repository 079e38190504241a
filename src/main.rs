// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use detect_node::{
    api::http_server::{start_server, AppState},
    config::ServiceConfig,
    detection::OnnxDetector,
    vision::BoxAnnotator,
};
use std::{env, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::from_env()?;
    info!(
        "Starting detection node (model: {}, threshold: {}, uploads: {})",
        config.model_path.display(),
        config.threshold,
        config.upload_dir.display()
    );

    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.upload_dir.display()
        )
    })?;

    // Model load is fatal on failure; the service must not start serving
    // without working weights
    let detector = OnnxDetector::load(&config.model_path, config.num_classes)?;
    let annotator = BoxAnnotator::new(config.font_path.as_deref());

    let state = AppState::new(
        Arc::new(detector),
        Arc::new(annotator),
        Arc::new(config),
    );

    start_server(state).await
}
