// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request types and validation for the extraction endpoints

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::vision::image_utils::MAX_IMAGE_SIZE;

/// Largest base64 string accepted (10MB decoded)
pub const MAX_BASE64_LEN: usize = MAX_IMAGE_SIZE / 3 * 4 + 4;

/// Body of `POST /process-id-base64`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessIdBase64Request {
    /// Base64 encoded image, optionally as a data URL
    #[serde(default)]
    pub image: Option<String>,
}

impl ProcessIdBase64Request {
    pub fn validate(&self) -> Result<&str, ApiError> {
        let image = match self.image.as_deref() {
            Some(image) if !image.trim().is_empty() => image,
            _ => {
                return Err(ApiError::ValidationError {
                    field: "image".to_string(),
                    message: "Missing 'image' key in request body".to_string(),
                })
            }
        };

        if image.len() > MAX_BASE64_LEN {
            return Err(ApiError::ValidationError {
                field: "image".to_string(),
                message: format!("image exceeds maximum size of {} bytes", MAX_IMAGE_SIZE),
            });
        }

        Ok(image)
    }
}

/// Multipart uploads must declare an `image/*` content type
pub fn validate_upload_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().starts_with("image/") => Ok(()),
        _ => Err(ApiError::ValidationError {
            field: "file".to_string(),
            message: "File must be an image".to_string(),
        }),
    }
}

/// Reject empty and oversized uploads before they reach the pipeline
pub fn validate_upload_size(len: usize) -> Result<(), ApiError> {
    if len == 0 {
        return Err(ApiError::ValidationError {
            field: "file".to_string(),
            message: "file is empty".to_string(),
        });
    }
    if len > MAX_IMAGE_SIZE {
        return Err(ApiError::ValidationError {
            field: "file".to_string(),
            message: format!("file exceeds maximum size of {} bytes", MAX_IMAGE_SIZE),
        });
    }
    Ok(())
}
