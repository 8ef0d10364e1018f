// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision building blocks for ID card extraction
//!
//! This module provides:
//! - Box geometry (letterbox, IoU, NMS)
//! - YOLO detectors for card fields and ID digits
//! - Text recognition for field crops
//! - The model registry shared by all requests
//!
//! All models run on CPU through ONNX Runtime.

pub mod detection;
pub mod geometry;
pub mod image_utils;
pub mod model_manager;
pub mod recognition;

pub use detection::{Detection, DetectionEngine, Detector, ModelMetadata, OrtEngine};
pub use geometry::{BBox, LetterboxInfo};
pub use image_utils::{decode_base64_payload, detect_format, ImageError};
pub use model_manager::{LoadedModels, ModelPaths, ModelRegistry, ModelStatus};
pub use recognition::{PaddleTextRecognizer, TextRecognizer};
