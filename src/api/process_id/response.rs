// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Response types for the extraction and probe endpoints

use serde::{Deserialize, Serialize};

use crate::pipeline::ExtractedFields;
use crate::version;
use crate::vision::ModelStatus;

/// Successful extraction, snake_case as served over HTTP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub first_name: String,
    pub second_name: String,
    pub location: String,
    pub id_number: String,
}

impl From<ExtractedFields> for ExtractionResponse {
    fn from(fields: ExtractedFields) -> Self {
        Self {
            first_name: fields.first_name,
            second_name: fields.second_name,
            location: fields.location,
            id_number: fields.id_number,
        }
    }
}

/// `GET /` liveness body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
}

impl Default for RootResponse {
    fn default() -> Self {
        Self {
            message: "Egyptian ID OCR API is running".to_string(),
            version: version::VERSION_NUMBER.to_string(),
            status: "healthy".to_string(),
        }
    }
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: ModelStatus,
}

impl HealthResponse {
    pub fn new(models_loaded: ModelStatus) -> Self {
        Self {
            status: "healthy".to_string(),
            models_loaded,
        }
    }
}
