// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector facade: preprocess, infer, postprocess

use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::engine::{DetectionEngine, OrtEngine};
use super::metadata::ModelMetadata;
use super::postprocess::{postprocess, Detection, PostprocessParams};
use super::preprocessing::preprocess_for_detector;

/// A YOLO detector bound to its class map
///
/// Cheap to clone; clones share the underlying engine.
#[derive(Clone)]
pub struct Detector {
    engine: Arc<dyn DetectionEngine>,
    metadata: Arc<ModelMetadata>,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("classes", &self.metadata.names.len())
            .field("input_width", &self.metadata.input_width)
            .field("input_height", &self.metadata.input_height)
            .finish_non_exhaustive()
    }
}

impl Detector {
    pub fn new(engine: Arc<dyn DetectionEngine>, metadata: ModelMetadata) -> Self {
        Self {
            engine,
            metadata: Arc::new(metadata),
        }
    }

    /// Load an ONNX detector and its JSON metadata sidecar
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        model_path: P,
        metadata_path: Q,
        intra_threads: usize,
    ) -> Result<Self> {
        let metadata = ModelMetadata::load(metadata_path.as_ref()).with_context(|| {
            format!(
                "Failed to load detector metadata for {}",
                model_path.as_ref().display()
            )
        })?;
        let engine = OrtEngine::load(model_path, intra_threads)?;
        Ok(Self::new(Arc::new(engine), metadata))
    }

    /// Same engine, different letterbox target
    pub fn with_input_size(self, width: u32, height: u32) -> Self {
        let metadata = (*self.metadata).clone().with_input_size(width, height);
        Self {
            engine: self.engine,
            metadata: Arc::new(metadata),
        }
    }

    /// Detect objects in an image
    ///
    /// Returns detections in original pixel coordinates, ordered by their
    /// position in the prediction tensor. An empty list is a valid result.
    pub fn detect(
        &self,
        image: &DynamicImage,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let start = Instant::now();

        let prepared =
            preprocess_for_detector(image, self.metadata.input_width, self.metadata.input_height);

        let predictions = self.engine.infer(&prepared.tensor)?;

        let detections = postprocess(
            predictions.view(),
            &prepared.letterbox,
            &self.metadata,
            PostprocessParams {
                confidence_threshold,
                iou_threshold,
            },
        )?;

        debug!(
            "Detected {} objects in {}ms",
            detections.len(),
            start.elapsed().as_millis()
        );

        Ok(detections)
    }
}
