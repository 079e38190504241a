// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::{ServiceConfig, PUBLIC_UPLOAD_PREFIX};
use crate::detection::Detector;
use crate::vision::Annotate;

use super::predict::predict_handler;

/// Request body cap; uploads are single images
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared per-process state handed to every request handler.
///
/// The detector and annotator are constructed once at startup and injected
/// here instead of living in module-level globals, so tests can swap in
/// stub implementations.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detector>,
    pub annotator: Arc<dyn Annotate>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(
        detector: Arc<dyn Detector>,
        annotator: Arc<dyn Annotate>,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            detector,
            annotator,
            config,
        }
    }
}

/// Builds the router. Kept separate from `start_server` so tests can drive
/// it through `tower::ServiceExt::oneshot` without binding a socket.
pub fn create_app(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        // Upload page
        .route("/", get(index_handler))
        // Health check
        .route("/health", get(health_handler))
        // Detection endpoint
        .route("/predict", post(predict_handler))
        // Raw uploads and annotated outputs
        .nest_service(PUBLIC_UPLOAD_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.api_port));
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Detection API listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model": state.detector.model_name(),
        "num_classes": state.detector.num_classes(),
    }))
}
