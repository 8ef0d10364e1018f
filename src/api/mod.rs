// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod process_id;

pub use errors::{ApiError, ApiErrorResponse, ErrorResponse};
pub use http_server::{create_router, start_server, AppState};
pub use process_id::{
    ExtractionResponse, HealthResponse, ProcessIdBase64Request, RootResponse,
};
