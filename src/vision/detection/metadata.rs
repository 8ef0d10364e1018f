// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector metadata descriptor (class map, input size, stride)
//!
//! Each detector ONNX file ships with a JSON sidecar:
//!
//! ```json
//! { "names": { "0": "egyptian-id", "1": "pic" }, "imgsz": [640, 640], "stride": 32 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use super::preprocessing::DETECTOR_INPUT_SIZE;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read model metadata {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse model metadata: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model metadata has no class names")]
    NoClasses,

    #[error("Invalid class id '{0}' in model metadata")]
    InvalidClassId(String),

    #[error("Invalid input size {0:?} in model metadata")]
    InvalidInputSize(Vec<u32>),
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    names: BTreeMap<String, String>,
    #[serde(default)]
    imgsz: Option<Vec<u32>>,
    #[serde(default)]
    stride: Option<u32>,
}

/// Class map and input geometry of a detector model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetadata {
    /// class id -> class name
    pub names: BTreeMap<u32, String>,
    /// Model input height
    pub input_height: u32,
    /// Model input width
    pub input_width: u32,
    /// Maximum feature stride
    pub stride: u32,
}

impl ModelMetadata {
    /// Build metadata from an explicit class list (ids are list positions)
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names
                .iter()
                .enumerate()
                .map(|(i, n)| (i as u32, n.as_ref().to_string()))
                .collect(),
            input_height: DETECTOR_INPUT_SIZE,
            input_width: DETECTOR_INPUT_SIZE,
            stride: 32,
        }
    }

    /// Override the model input size
    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_width = width;
        self.input_height = height;
        self
    }

    /// Parse a JSON metadata descriptor
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let raw: RawMetadata = serde_json::from_str(json)?;

        if raw.names.is_empty() {
            return Err(MetadataError::NoClasses);
        }

        let mut names = BTreeMap::new();
        for (id, name) in raw.names {
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| MetadataError::InvalidClassId(id.clone()))?;
            names.insert(id, name);
        }

        let (input_height, input_width) = match raw.imgsz.as_deref() {
            None => (DETECTOR_INPUT_SIZE, DETECTOR_INPUT_SIZE),
            Some([size]) if *size > 0 => (*size, *size),
            Some([h, w]) if *h > 0 && *w > 0 => (*h, *w),
            Some(other) => return Err(MetadataError::InvalidInputSize(other.to_vec())),
        };

        Ok(Self {
            names,
            input_height,
            input_width,
            stride: raw.stride.unwrap_or(32),
        })
    }

    /// Load a JSON metadata descriptor from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| MetadataError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Number of output classes (highest id + 1)
    pub fn num_classes(&self) -> usize {
        self.names
            .keys()
            .next_back()
            .map(|&max| max as usize + 1)
            .unwrap_or(0)
    }

    /// Class name for an id, falling back to the numeric id
    pub fn class_name(&self, class_id: u32) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }
}
