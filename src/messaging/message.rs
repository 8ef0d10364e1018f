// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inbound message parsing and reply shapes for the OCR queue
//!
//! Producers either wrap the payload in a microservice envelope
//! `{pattern, data: {image_base64}, id}` or send `{image_base64}` directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::pipeline::{ExtractedFields, ExtractionResult};

/// Pattern answered as a liveness check
pub const HEALTH_PATTERN: &str = "ocr.isUp";

/// Status string returned for health checks
pub const HEALTH_STATUS: &str = "OCR Service is running";

/// The only error text a queue client ever sees
pub const INVALID_PHOTO_REPLY: &str = "Invalid ID photo";

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Invalid JSON message: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing image_base64 in message")]
    MissingImage,
}

/// What a delivery asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    HealthCheck,
    Extract { image_base64: String },
}

impl InboundMessage {
    pub fn parse(body: &[u8]) -> Result<Self, MessageError> {
        let message: Value = serde_json::from_slice(body)?;

        if is_health_pattern(message.get("pattern")) {
            return Ok(InboundMessage::HealthCheck);
        }

        let payload = match message.get("data") {
            Some(data) if data.is_object() => data,
            _ => &message,
        };

        payload
            .get("image_base64")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| InboundMessage::Extract {
                image_base64: s.to_string(),
            })
            .ok_or(MessageError::MissingImage)
    }
}

/// `"ocr.isUp"` or `{"cmd": "ocr.isUp"}`
fn is_health_pattern(pattern: Option<&Value>) -> bool {
    match pattern {
        Some(Value::String(s)) => s == HEALTH_PATTERN,
        Some(Value::Object(map)) => map.get("cmd").and_then(Value::as_str) == Some(HEALTH_PATTERN),
        _ => false,
    }
}

/// Extracted fields in the queue's camelCase contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReply {
    pub first_name: String,
    pub last_name: String,
    pub location: String,
    pub social_security_number: String,
}

impl From<ExtractedFields> for ExtractionReply {
    fn from(fields: ExtractedFields) -> Self {
        Self {
            first_name: fields.first_name,
            last_name: fields.second_name,
            location: fields.location,
            social_security_number: fields.id_number,
        }
    }
}

/// Body published to the reply queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Extracted(ExtractionReply),
    Health { status: String },
    Error { error: String },
}

impl Reply {
    pub fn health() -> Self {
        Reply::Health {
            status: HEALTH_STATUS.to_string(),
        }
    }

    pub fn invalid_photo() -> Self {
        Reply::Error {
            error: INVALID_PHOTO_REPLY.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl From<ExtractionResult> for Reply {
    fn from(result: ExtractionResult) -> Self {
        match result {
            ExtractionResult::Success(fields) => Reply::Extracted(fields.into()),
            ExtractionResult::Failure { .. } => Reply::invalid_photo(),
        }
    }
}
