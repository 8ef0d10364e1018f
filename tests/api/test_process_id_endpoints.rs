// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! `POST /process-id` and `POST /process-id-base64`

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::support::*;
use id_card_ocr::api::{create_router, AppState};
use id_card_ocr::vision::LoadedModels;

const BOUNDARY: &str = "----idcardtestboundary";

fn state(models: LoadedModels, work_dir: &Path) -> AppState {
    AppState::new(registry_with(models), test_config(work_dir))
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn base64_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process-id-base64")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"card.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/process-id")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_base64_success() {
    let tmp = TempDir::new().unwrap();
    let image = STANDARD.encode(png_bytes(&standard_card()));

    let (status, body) = send(
        state(standard_models(), tmp.path()),
        base64_request(json!({ "image": image })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], color_text(FIRST_COLOR));
    assert_eq!(body["second_name"], color_text(SECOND_COLOR));
    assert_eq!(body["location"], color_text(LOCATION_COLOR));
    assert_eq!(body["id_number"], ID_NUMBER);
    assert_eq!(leftover_entries(tmp.path()), 0);
}

#[tokio::test]
async fn test_base64_data_url_accepted() {
    let tmp = TempDir::new().unwrap();
    let image = format!(
        "data:image/png;base64,{}",
        STANDARD.encode(png_bytes(&standard_card()))
    );

    let (status, _) = send(
        state(standard_models(), tmp.path()),
        base64_request(json!({ "image": image })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_base64_missing_image_key() {
    let tmp = TempDir::new().unwrap();
    let (status, body) =
        send(state(standard_models(), tmp.path()), base64_request(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert_eq!(body["message"], "Missing 'image' key in request body");
}

#[tokio::test]
async fn test_base64_not_base64() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        state(standard_models(), tmp.path()),
        base64_request(json!({ "image": "%%% not base64 %%%" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "invalid_request");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_base64_invalid_photo() {
    let tmp = TempDir::new().unwrap();
    let image = STANDARD.encode(png_bytes(&standard_card()));

    let (status, body) = send(
        state(models_with(region_detector(Vec::new())), tmp.path()),
        base64_request(json!({ "image": image })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid National ID Photo");
    assert_eq!(leftover_entries(tmp.path()), 0);
}

#[tokio::test]
async fn test_multipart_success() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        state(standard_models(), tmp.path()),
        multipart_request("file", "image/png", &png_bytes(&standard_card())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], color_text(FIRST_COLOR));
    assert_eq!(body["id_number"], ID_NUMBER);
    assert_eq!(leftover_entries(tmp.path()), 0);
}

#[tokio::test]
async fn test_multipart_rejects_non_image() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        state(standard_models(), tmp.path()),
        multipart_request("file", "application/pdf", b"%PDF-1.4"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File must be an image");
    assert_eq!(body["details"]["field"], "file");
}

#[tokio::test]
async fn test_multipart_missing_file_field() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        state(standard_models(), tmp.path()),
        multipart_request("upload", "image/png", &png_bytes(&standard_card())),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "file is required");
}

#[tokio::test]
async fn test_multipart_garbage_image_is_internal_error() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        state(standard_models(), tmp.path()),
        multipart_request("file", "image/png", b"not really a png"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal processing error");
    assert_eq!(leftover_entries(tmp.path()), 0);
}

#[tokio::test]
async fn test_incomplete_extraction_is_500() {
    let tmp = TempDir::new().unwrap();
    let mut candidates = standard_candidates();
    candidates.push(Candidate {
        class: 3,
        cx: 300.0,
        cy: 40.0,
        w: 200.0,
        h: 40.0,
        score: 0.95,
    });

    let (status, body) = send(
        state(models_with(region_detector(candidates)), tmp.path()),
        multipart_request("file", "image/png", &png_bytes(&standard_card())),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_type"], "incomplete_extraction");
    assert_eq!(body["message"], "Failed to extract all required fields from ID");
}
