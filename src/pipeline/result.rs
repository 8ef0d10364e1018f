// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Outcome of a single extraction request

use serde::{Deserialize, Serialize};

use super::errors::{FailureKind, PipelineError};

/// Fields read from an ID card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub first_name: String,
    pub second_name: String,
    pub location: String,
    /// Empty when the card region or its digits were not found
    pub id_number: String,
}

/// Either the extracted record or a classified failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Success(ExtractedFields),
    Failure {
        kind: FailureKind,
        /// Diagnostic detail for logs, not for clients
        message: String,
    },
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success(_))
    }

    pub fn fields(&self) -> Option<&ExtractedFields> {
        match self {
            ExtractionResult::Success(fields) => Some(fields),
            ExtractionResult::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ExtractionResult::Success(_) => None,
            ExtractionResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<ExtractedFields, PipelineError>> for ExtractionResult {
    fn from(result: Result<ExtractedFields, PipelineError>) -> Self {
        match result {
            Ok(fields) => ExtractionResult::Success(fields),
            Err(err) => ExtractionResult::Failure {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}
