// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::process_id::{
    health_handler, process_id_base64_handler, process_id_handler, root_handler,
};
use crate::config::ServiceConfig;
use crate::pipeline::PipelineConfig;
use crate::vision::image_utils::MAX_IMAGE_SIZE;
use crate::vision::ModelRegistry;

/// Request bodies may carry a base64 or multipart encoded 10MB image
const MAX_BODY_SIZE: usize = MAX_IMAGE_SIZE * 2;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub pipeline_config: PipelineConfig,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, pipeline_config: PipelineConfig) -> Self {
        Self {
            registry,
            pipeline_config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Probes
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        // Extraction
        .route("/process-id", post(process_id_handler))
        .route("/process-id-base64", post(process_id_base64_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(
    config: ServiceConfig,
    registry: Arc<ModelRegistry>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(registry, config.pipeline.clone());
    let app = create_router(state);

    let addr = config.bind_address().parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
