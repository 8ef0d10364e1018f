// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration loaded from environment variables

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::pipeline::{
    PipelineConfig, DEFAULT_CARD_CLASS, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DIGIT_CONFIDENCE,
    DEFAULT_PHOTO_CLASS,
};
use crate::vision::detection::DEFAULT_INTRA_THREADS;
use crate::vision::geometry::DEFAULT_IOU_THRESHOLD;
use crate::vision::ModelPaths;

pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 8000;
pub const DEFAULT_MODELS_DIR: &str = "./models";

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Model artifact locations
    pub models: ModelPaths,
    /// Thresholds and work directory
    pub pipeline: PipelineConfig,
    /// HTTP bind address
    pub api_host: String,
    /// HTTP port
    pub api_port: u16,
    /// Load all models at startup instead of on first request
    pub preload_models: bool,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn path_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, dir: &Path, file: &str) -> PathBuf {
    lookup(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| dir.join(file))
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let models_dir =
            PathBuf::from(lookup("MODELS_DIR").unwrap_or_else(|| DEFAULT_MODELS_DIR.to_string()));
        let defaults = PipelineConfig::default();

        Self {
            models: ModelPaths {
                region_model: path_or(
                    &lookup,
                    "CLASS_MODEL_PATH",
                    &models_dir,
                    "detect_objects.onnx",
                ),
                region_metadata: path_or(
                    &lookup,
                    "CLASS_METADATA_PATH",
                    &models_dir,
                    "detect_objects.json",
                ),
                digit_model: path_or(&lookup, "ID_MODEL_PATH", &models_dir, "detect_id.onnx"),
                digit_metadata: path_or(&lookup, "ID_METADATA_PATH", &models_dir, "detect_id.json"),
                recognition_model: path_or(
                    &lookup,
                    "REC_MODEL_PATH",
                    &models_dir,
                    "rec_model.onnx",
                ),
                recognition_dict: path_or(&lookup, "REC_DICT_PATH", &models_dir, "rec_dict.txt"),
                intra_threads: parse_or(&lookup, "ORT_INTRA_THREADS", DEFAULT_INTRA_THREADS),
                region_input_size: lookup("IMAGE_SIZE").and_then(|v| v.trim().parse().ok()),
            },
            pipeline: PipelineConfig {
                confidence_threshold: parse_or(
                    &lookup,
                    "CONFIDENCE_THRESHOLD",
                    DEFAULT_CONFIDENCE_THRESHOLD,
                ),
                digit_confidence_threshold: parse_or(
                    &lookup,
                    "ID_DIGIT_CONFIDENCE",
                    DEFAULT_DIGIT_CONFIDENCE,
                ),
                iou_threshold: parse_or(&lookup, "IOU_THRESHOLD", DEFAULT_IOU_THRESHOLD),
                work_dir: lookup("TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir),
                card_class: lookup("CARD_CLASS")
                    .unwrap_or_else(|| DEFAULT_CARD_CLASS.to_string()),
                photo_class: lookup("PHOTO_CLASS")
                    .unwrap_or_else(|| DEFAULT_PHOTO_CLASS.to_string()),
            },
            api_host: lookup("API_HOST").unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            api_port: parse_or(&lookup, "API_PORT", DEFAULT_API_PORT),
            preload_models: lookup("PRELOAD_MODELS")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        let unit = 0.0f32..=1.0;
        if !unit.contains(&self.pipeline.confidence_threshold) {
            return Err("CONFIDENCE_THRESHOLD must be between 0 and 1".to_string());
        }
        if !unit.contains(&self.pipeline.digit_confidence_threshold) {
            return Err("ID_DIGIT_CONFIDENCE must be between 0 and 1".to_string());
        }
        if !unit.contains(&self.pipeline.iou_threshold) {
            return Err("IOU_THRESHOLD must be between 0 and 1".to_string());
        }
        if let Some(size) = self.models.region_input_size {
            if size == 0 || size % 32 != 0 {
                return Err(format!("IMAGE_SIZE must be a positive multiple of 32, got {}", size));
            }
        }
        if self.pipeline.card_class == self.pipeline.photo_class {
            return Err("CARD_CLASS and PHOTO_CLASS must differ".to_string());
        }
        if self.models.intra_threads == 0 {
            return Err("ORT_INTRA_THREADS must be greater than 0".to_string());
        }
        if self.api_port == 0 {
            return Err("API_PORT must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
