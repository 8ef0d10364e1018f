// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference backends for the YOLO detectors
//!
//! `DetectionEngine` is the seam between tensor preparation / decoding and
//! the runtime that actually executes the network. `OrtEngine` runs an ONNX
//! export through ONNX Runtime on the CPU.

use anyhow::{anyhow, Context, Result};
use ndarray::{Array4, ArrayD};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Default ONNX Runtime intra-op thread count
pub const DEFAULT_INTRA_THREADS: usize = 4;

/// Executes a detector network on a prepared NCHW tensor
///
/// Implementations must be safe to call from several worker threads.
pub trait DetectionEngine: Send + Sync {
    /// Run the network on a `[1, 3, H, W]` tensor and return the raw
    /// prediction tensor (`[1, 4 + nc, N]` or `[1, N, 4 + nc]`)
    fn infer(&self, input: &Array4<f32>) -> Result<ArrayD<f32>>;
}

/// ONNX Runtime detector backend
///
/// The session sits behind a mutex, so concurrent requests sharing one
/// engine run inference one at a time.
#[derive(Clone)]
pub struct OrtEngine {
    session: Arc<Mutex<Session>>,
    input_name: String,
    model_path: String,
}

impl std::fmt::Debug for OrtEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEngine")
            .field("input_name", &self.input_name)
            .field("model_path", &self.model_path)
            .finish_non_exhaustive()
    }
}

impl OrtEngine {
    /// Load a detector from an ONNX file
    ///
    /// # Errors
    /// Returns error if the file is missing or ONNX Runtime rejects it.
    pub fn load<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads.max(1))
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        if let Some(input) = session.inputs.first() {
            debug!("Detector input {}: {:?}", input_name, input.input_type);
        }
        if let Some(output) = session.outputs.first() {
            debug!("Detector output {}: {:?}", output.name, output.output_type);
        }

        info!("✅ Detection model loaded: {}", model_path.display());

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            model_path: model_path.display().to_string(),
        })
    }
}

impl DetectionEngine for OrtEngine {
    fn infer(&self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Detection session lock poisoned: {}", e))?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        let predictions = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract prediction tensor")?;

        debug!("Detector output shape: {:?}", predictions.shape());

        Ok(predictions.to_owned())
    }
}
