// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text recognition for field crops
//!
//! `TextRecognizer` is the seam the pipeline calls: crop in, ordered text
//! fragments out. `PaddleTextRecognizer` implements it with a PaddleOCR
//! recognition network (CTC head) exported to ONNX.

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array4, ArrayViewD, IxDyn};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Recognition input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Widest crop fed to the recognizer
pub const REC_MAX_WIDTH: u32 = 320;

/// Recognizes the text in a cropped field image
///
/// Fragments are returned in the order the engine reports them; callers
/// decide the reading order.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<String>>;
}

/// Resize a crop to `REC_INPUT_HEIGHT` and normalize to [-1, 1]
///
/// Output is NCHW `[1, 3, 48, W]` with `4 <= W <= REC_MAX_WIDTH`.
pub fn preprocess_for_recognition(image: &DynamicImage) -> Array4<f32> {
    let (orig_w, orig_h) = image.dimensions();

    let scale = REC_INPUT_HEIGHT as f32 / orig_h.max(1) as f32;
    let new_width = ((orig_w as f32 * scale).round() as u32).clamp(4, REC_MAX_WIDTH);

    let rgb = image
        .resize_exact(new_width, REC_INPUT_HEIGHT, FilterType::Triangle)
        .to_rgb8();

    let mut tensor = Array4::zeros((1, 3, REC_INPUT_HEIGHT as usize, new_width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
        }
    }

    tensor
}

/// Load a character dictionary (one character per line)
///
/// Index 0 is reserved for the CTC blank; a trailing space class is
/// appended as PaddleOCR does.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> Result<Vec<char>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open dictionary: {}", path.display()))?;

    let mut dictionary = vec!['\0'];
    for line in BufReader::new(file).lines() {
        let line = line.context("Failed to read dictionary line")?;
        if let Some(ch) = line.chars().next() {
            dictionary.push(ch);
        }
    }
    dictionary.push(' ');

    Ok(dictionary)
}

/// Greedy CTC decoding: best class per timestep, collapse repeats, drop blanks
///
/// Accepts `[1, T, C]` or `[T, C]` probability tensors.
pub fn ctc_decode(output: &ArrayViewD<f32>, dictionary: &[char]) -> Result<String> {
    let shape = output.shape();
    let (seq_len, num_classes) = match shape.len() {
        3 => (shape[1], shape[2]),
        2 => (shape[0], shape[1]),
        _ => anyhow::bail!("Unexpected recognition output shape: {:?}", shape),
    };

    let mut text = String::new();
    let mut prev_index: Option<usize> = None;

    for t in 0..seq_len {
        let mut max_prob = f32::NEG_INFINITY;
        let mut max_index = 0usize;

        for c in 0..num_classes {
            let prob = if shape.len() == 3 {
                output[IxDyn(&[0, t, c])]
            } else {
                output[IxDyn(&[t, c])]
            };
            if prob > max_prob {
                max_prob = prob;
                max_index = c;
            }
        }

        if max_index != 0 && Some(max_index) != prev_index {
            if let Some(&ch) = dictionary.get(max_index) {
                text.push(ch);
            }
        }

        prev_index = if max_index == 0 { None } else { Some(max_index) };
    }

    Ok(text)
}

/// PaddleOCR recognition network behind ONNX Runtime
///
/// Treats each crop as a single text line and returns at most one fragment.
#[derive(Clone)]
pub struct PaddleTextRecognizer {
    session: Arc<Mutex<Session>>,
    dictionary: Arc<Vec<char>>,
    input_name: String,
}

impl std::fmt::Debug for PaddleTextRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaddleTextRecognizer")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl PaddleTextRecognizer {
    /// Load the recognition model and its character dictionary
    ///
    /// # Errors
    /// Returns error if either file is missing or ONNX Runtime rejects the model.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        model_path: P,
        dict_path: Q,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let dict_path = dict_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Recognition model not found: {}", model_path.display());
        }
        if !dict_path.exists() {
            anyhow::bail!("Character dictionary not found: {}", dict_path.display());
        }

        info!("Loading recognition model from {}", model_path.display());

        let dictionary = load_dictionary(dict_path)?;
        info!("Loaded character dictionary with {} entries", dictionary.len());

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
                "Failed to load recognition model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        info!("✅ Recognition model loaded successfully (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
        })
    }
}

impl TextRecognizer for PaddleTextRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<String>> {
        let input = preprocess_for_recognition(image);

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Recognition session lock poisoned: {}", e))?;

        let input_value = Value::from_array(input).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Recognition inference failed")?;

        let probs = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let text = ctc_decode(&probs, &self.dictionary)?;
        debug!("Recognized {} chars", text.chars().count());

        let text = text.trim();
        if text.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![text.to_string()])
        }
    }
}
