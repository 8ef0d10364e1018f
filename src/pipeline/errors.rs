// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline error types and failure classification

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::vision::ImageError;

/// Stages a request moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Detect,
    Select,
    Crop,
    RecognizeText,
    ExtractDigits,
    Assemble,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::Detect => "DETECT",
            Stage::Select => "SELECT",
            Stage::Crop => "CROP",
            Stage::RecognizeText => "RECOGNIZE_TEXT",
            Stage::ExtractDigits => "EXTRACT_DIGITS",
            Stage::Assemble => "ASSEMBLE",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Reasons the region selector rejects a photo
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No boxes detected")]
    NoBoxesDetected,

    #[error("Not enough text boxes after filtering: found {found}, need 3")]
    InsufficientTextBoxes { found: usize },
}

/// Failure categories exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The photo is not a usable ID card
    InvalidPhoto,
    /// A required field crop could not be produced
    IncompleteExtraction,
    /// Any other fault
    Internal,
}

impl FailureKind {
    /// Message safe to return to clients
    pub fn public_message(&self) -> &'static str {
        match self {
            FailureKind::InvalidPhoto => "Invalid National ID Photo",
            FailureKind::IncompleteExtraction => "Failed to extract all required fields from ID",
            FailureKind::Internal => "Internal processing error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.public_message())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Missing field crops: {missing:?}")]
    IncompleteExtraction { missing: Vec<String> },

    #[error("Invalid request id '{0}'")]
    InvalidRequestId(String),

    #[error("Request directory already exists: {0}")]
    DuplicateRequest(String),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{stage} failed: {message}")]
    Stage { stage: Stage, message: String },

    #[error("Pipeline panicked: {0}")]
    Panic(String),
}

impl PipelineError {
    /// Wrap an engine or IO fault raised while running `stage`
    pub fn stage(stage: Stage, err: anyhow::Error) -> Self {
        PipelineError::Stage {
            stage,
            message: format!("{:#}", err),
        }
    }

    /// Map to the failure category reported to callers
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Selection(_) => FailureKind::InvalidPhoto,
            PipelineError::IncompleteExtraction { .. } => FailureKind::IncompleteExtraction,
            _ => FailureKind::Internal,
        }
    }
}
