// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ID card extraction endpoints
//!
//! - `GET /` and `GET /health` probes
//! - `POST /process-id` multipart upload
//! - `POST /process-id-base64` JSON payload

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{health_handler, process_id_base64_handler, process_id_handler, root_handler};
pub use request::{validate_upload_content_type, validate_upload_size, ProcessIdBase64Request};
pub use response::{ExtractionResponse, HealthResponse, RootResponse};
