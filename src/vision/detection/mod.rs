// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO-style object detection
//!
//! Pipeline: image -> letterbox tensor -> engine -> decode + per-class NMS
//! -> detections in source pixel space.
//!
//! The region model localizes card fields; the digit model runs on the
//! ID-number crop and reports one detection per digit.

pub mod detector;
pub mod engine;
pub mod metadata;
pub mod postprocess;
pub mod preprocessing;

pub use detector::Detector;
pub use engine::{DetectionEngine, OrtEngine, DEFAULT_INTRA_THREADS};
pub use metadata::{MetadataError, ModelMetadata};
pub use postprocess::{postprocess, Detection, PostprocessParams};
pub use preprocessing::{
    letterbox, preprocess_for_detector, PreparedInput, DETECTOR_INPUT_SIZE, PAD_COLOR,
};
