// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ID card extraction and probe handlers

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::request::{validate_upload_content_type, validate_upload_size, ProcessIdBase64Request};
use super::response::{ExtractionResponse, HealthResponse, RootResponse};
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::pipeline::{ExtractionResult, IdCardPipeline};
use crate::vision::decode_base64_payload;

/// GET / - Liveness probe
pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse::default())
}

/// GET /health - Which models are loaded
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(state.registry.status()))
}

/// POST /process-id - Extract fields from an uploaded ID card photo
///
/// # Request
/// Multipart form with a `file` part whose content type starts with `image/`.
///
/// # Errors
/// - 400 Bad Request: not an image, or not a valid ID card photo
/// - 500 Internal Server Error: extraction failed
pub async fn process_id_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractionResponse>, ApiErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    debug!("[{}] Upload received", request_id);

    // 1. Find the file part
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("[{}] Malformed multipart body: {}", request_id, e);
        ApiErrorResponse::new(ApiError::InvalidRequest(e.to_string()), &request_id)
    })? {
        if field.name() != Some("file") {
            continue;
        }

        // 2. Validate content type before reading the body
        let content_type = field.content_type().map(str::to_string);
        validate_upload_content_type(content_type.as_deref()).map_err(|e| {
            warn!("[{}] Rejected upload: {}", request_id, e);
            ApiErrorResponse::new(e, &request_id)
        })?;

        let bytes = field.bytes().await.map_err(|e| {
            warn!("[{}] Failed to read upload: {}", request_id, e);
            ApiErrorResponse::new(ApiError::InvalidRequest(e.to_string()), &request_id)
        })?;
        upload = Some(bytes.to_vec());
        break;
    }

    let bytes = upload.ok_or_else(|| {
        ApiErrorResponse::new(
            ApiError::ValidationError {
                field: "file".to_string(),
                message: "file is required".to_string(),
            },
            &request_id,
        )
    })?;
    validate_upload_size(bytes.len()).map_err(|e| ApiErrorResponse::new(e, &request_id))?;

    // 3. Run the pipeline
    run_extraction(&state, bytes, &request_id).await.map(Json)
}

/// POST /process-id-base64 - Extract fields from a base64 encoded photo
///
/// # Request
/// - `image`: base64 image, optionally a data URL (required)
///
/// # Errors
/// - 400 Bad Request: missing or undecodable image, or not a valid ID card photo
/// - 500 Internal Server Error: extraction failed
pub async fn process_id_base64_handler(
    State(state): State<AppState>,
    Json(request): Json<ProcessIdBase64Request>,
) -> Result<Json<ExtractionResponse>, ApiErrorResponse> {
    let request_id = Uuid::new_v4().to_string();

    // 1. Validate request
    let image = request.validate().map_err(|e| {
        warn!("[{}] Validation failed: {}", request_id, e);
        ApiErrorResponse::new(e, &request_id)
    })?;

    // 2. Decode payload
    let bytes = decode_base64_payload(image).map_err(|e| {
        warn!("[{}] Failed to decode image: {}", request_id, e);
        ApiErrorResponse::new(
            ApiError::InvalidRequest(format!("Invalid image: {}", e)),
            &request_id,
        )
    })?;

    // 3. Run the pipeline
    run_extraction(&state, bytes, &request_id).await.map(Json)
}

async fn run_extraction(
    state: &AppState,
    bytes: Vec<u8>,
    request_id: &str,
) -> Result<ExtractionResponse, ApiErrorResponse> {
    let models = state.registry.models().await.map_err(|e| {
        error!("[{}] Models unavailable: {:#}", request_id, e);
        ApiErrorResponse::new(ApiError::InternalError(e.to_string()), request_id)
    })?;

    let pipeline = IdCardPipeline::new(models, state.pipeline_config.clone());
    let id = request_id.to_string();
    let result = tokio::task::spawn_blocking(move || pipeline.process_bytes(&bytes, &id))
        .await
        .map_err(|e| {
            error!("[{}] Extraction task failed: {}", request_id, e);
            ApiErrorResponse::new(ApiError::InternalError(e.to_string()), request_id)
        })?;

    match result {
        ExtractionResult::Success(fields) => {
            info!("[{}] Extraction complete", request_id);
            Ok(fields.into())
        }
        ExtractionResult::Failure { kind, message } => Err(ApiErrorResponse::new(
            ApiError::from_failure(kind, message),
            request_id,
        )),
    }
}
