// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide registry of the region detector, digit detector and recognizer
//!
//! Each model is loaded at most once, either eagerly through `preload()` or
//! on first use. Concurrent first callers wait on the same initialization.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::vision::detection::{Detector, DEFAULT_INTRA_THREADS};
use crate::vision::recognition::{PaddleTextRecognizer, TextRecognizer};

/// Locations of the model artifacts
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Field/region detector ONNX file
    pub region_model: PathBuf,
    /// JSON class map for the region detector
    pub region_metadata: PathBuf,
    /// Digit detector ONNX file
    pub digit_model: PathBuf,
    /// JSON class map for the digit detector
    pub digit_metadata: PathBuf,
    /// Text recognition ONNX file
    pub recognition_model: PathBuf,
    /// Character dictionary for the recognizer
    pub recognition_dict: PathBuf,
    /// ONNX Runtime intra-op threads per session
    pub intra_threads: usize,
    /// Square input size forced on the region detector
    pub region_input_size: Option<u32>,
}

impl Default for ModelPaths {
    fn default() -> Self {
        let dir = PathBuf::from("./models");
        Self {
            region_model: dir.join("detect_objects.onnx"),
            region_metadata: dir.join("detect_objects.json"),
            digit_model: dir.join("detect_id.onnx"),
            digit_metadata: dir.join("detect_id.json"),
            recognition_model: dir.join("rec_model.onnx"),
            recognition_dict: dir.join("rec_dict.txt"),
            intra_threads: DEFAULT_INTRA_THREADS,
            region_input_size: None,
        }
    }
}

/// Handles to every model a request needs
#[derive(Clone)]
pub struct LoadedModels {
    pub detector: Detector,
    pub digit_detector: Detector,
    pub recognizer: Arc<dyn TextRecognizer>,
}

/// Which models have finished loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub classification_model: bool,
    pub id_digit_model: bool,
    pub ocr_model: bool,
}

/// Registry handing out shared model handles
pub struct ModelRegistry {
    paths: ModelPaths,
    detector: OnceCell<Detector>,
    digit_detector: OnceCell<Detector>,
    recognizer: OnceCell<Arc<dyn TextRecognizer>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("paths", &self.paths)
            .field("status", &self.status())
            .finish()
    }
}

impl ModelRegistry {
    /// Registry that loads models from `paths` on demand
    pub fn new(paths: ModelPaths) -> Self {
        Self {
            paths,
            detector: OnceCell::new(),
            digit_detector: OnceCell::new(),
            recognizer: OnceCell::new(),
        }
    }

    /// Registry pre-populated with already constructed models
    pub fn with_models(
        detector: Detector,
        digit_detector: Detector,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        Self {
            paths: ModelPaths::default(),
            detector: OnceCell::new_with(Some(detector)),
            digit_detector: OnceCell::new_with(Some(digit_detector)),
            recognizer: OnceCell::new_with(Some(recognizer)),
        }
    }

    /// Region detector, loading it on first use
    pub async fn detector(&self) -> Result<Detector> {
        self.detector
            .get_or_try_init(|| {
                let model = self.paths.region_model.clone();
                let metadata = self.paths.region_metadata.clone();
                let threads = self.paths.intra_threads;
                let input_size = self.paths.region_input_size;
                async move {
                    let detector = tokio::task::spawn_blocking(move || {
                        Detector::load(model, metadata, threads)
                    })
                    .await
                    .context("Region detector loader panicked")??;
                    Ok::<Detector, anyhow::Error>(match input_size {
                        Some(size) => detector.with_input_size(size, size),
                        None => detector,
                    })
                }
            })
            .await
            .cloned()
    }

    /// Digit detector, loading it on first use
    pub async fn digit_detector(&self) -> Result<Detector> {
        self.digit_detector
            .get_or_try_init(|| {
                let model = self.paths.digit_model.clone();
                let metadata = self.paths.digit_metadata.clone();
                let threads = self.paths.intra_threads;
                async move {
                    tokio::task::spawn_blocking(move || Detector::load(model, metadata, threads))
                        .await
                        .context("Digit detector loader panicked")?
                }
            })
            .await
            .cloned()
    }

    /// Text recognizer, loading it on first use
    pub async fn recognizer(&self) -> Result<Arc<dyn TextRecognizer>> {
        self.recognizer
            .get_or_try_init(|| {
                let model = self.paths.recognition_model.clone();
                let dict = self.paths.recognition_dict.clone();
                let threads = self.paths.intra_threads;
                async move {
                    let recognizer = tokio::task::spawn_blocking(move || {
                        PaddleTextRecognizer::load(model, dict, threads)
                    })
                    .await
                    .context("Recognizer loader panicked")??;
                    Ok::<Arc<dyn TextRecognizer>, anyhow::Error>(Arc::new(recognizer))
                }
            })
            .await
            .cloned()
    }

    /// All three models, loading whichever are missing
    pub async fn models(&self) -> Result<LoadedModels> {
        Ok(LoadedModels {
            detector: self.detector().await?,
            digit_detector: self.digit_detector().await?,
            recognizer: self.recognizer().await?,
        })
    }

    /// Load every model up front
    pub async fn preload(&self) -> Result<()> {
        info!("Preloading models...");
        match self.models().await {
            Ok(_) => {
                info!("✅ All models loaded");
                Ok(())
            }
            Err(e) => {
                warn!("⚠️ Model preload failed: {:#}", e);
                Err(e)
            }
        }
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            classification_model: self.detector.initialized(),
            id_digit_model: self.digit_detector.initialized(),
            ocr_model: self.recognizer.initialized(),
        }
    }
}
