// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request driver for the extraction pipeline
//!
//! `DETECT -> SELECT -> CROP -> RECOGNIZE_TEXT -> EXTRACT_DIGITS -> ASSEMBLE`
//!
//! Every request works inside its own `RequestContext`, which is dropped
//! (and its directory removed) on every exit path, panics included.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

use super::context::RequestContext;
use super::crops::save_crops;
use super::digits::{DigitAssembler, DEFAULT_DIGIT_CONFIDENCE};
use super::errors::{FailureKind, PipelineError, Stage};
use super::result::{ExtractedFields, ExtractionResult};
use super::selector::{RegionSelector, DEFAULT_CARD_CLASS, DEFAULT_PHOTO_CLASS};
use crate::vision::geometry::DEFAULT_IOU_THRESHOLD;
use crate::vision::image_utils::{format_to_extension, load_image, validate_image_bytes};
use crate::vision::{Detector, LoadedModels, TextRecognizer};

/// Default confidence threshold for the region detector
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// File name used for payloads written into the isolation directory
const UPLOAD_STEM: &str = "id";

/// Thresholds and locations used by the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Region detector confidence threshold
    pub confidence_threshold: f32,
    /// Digit detector confidence threshold
    pub digit_confidence_threshold: f32,
    /// NMS IoU threshold for both detectors
    pub iou_threshold: f32,
    /// Parent of all request isolation directories
    pub work_dir: PathBuf,
    /// Class name of the whole-card detection
    pub card_class: String,
    /// Class name of the portrait detection
    pub photo_class: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            digit_confidence_threshold: DEFAULT_DIGIT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            work_dir: std::env::temp_dir().join("id-card-ocr"),
            card_class: DEFAULT_CARD_CLASS.to_string(),
            photo_class: DEFAULT_PHOTO_CLASS.to_string(),
        }
    }
}

/// Stage timings for one request, in milliseconds
#[derive(Debug, Clone, Default)]
struct Timings {
    detection: u128,
    cropping: u128,
    recognition: u128,
    id_extraction: u128,
}

/// Drives a single image through detection, cropping and recognition
///
/// Cheap to clone; clones share the model handles.
#[derive(Clone)]
pub struct IdCardPipeline {
    detector: Detector,
    digits: DigitAssembler,
    recognizer: Arc<dyn TextRecognizer>,
    selector: RegionSelector,
    config: PipelineConfig,
}

impl std::fmt::Debug for IdCardPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdCardPipeline")
            .field("detector", &self.detector)
            .field("selector", &self.selector)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IdCardPipeline {
    pub fn new(models: LoadedModels, config: PipelineConfig) -> Self {
        Self {
            detector: models.detector,
            digits: DigitAssembler::new(
                models.digit_detector,
                config.digit_confidence_threshold,
                config.iou_threshold,
            ),
            recognizer: models.recognizer,
            selector: RegionSelector::new(config.card_class.clone(), config.photo_class.clone()),
            config,
        }
    }

    /// Extract the card fields from an image on disk
    ///
    /// Crops are written under `work_dir/<request_id>` and removed before
    /// this returns.
    pub fn process(&self, image_path: &Path, request_id: &str) -> ExtractionResult {
        let span = info_span!("request", request_id = %request_id);
        let _enter = span.enter();
        let start = Instant::now();

        let result = RequestContext::create(&self.config.work_dir, request_id)
            .and_then(|ctx| self.guarded(&ctx, image_path));

        self.finish(result, start)
    }

    /// Extract the card fields from an in-memory payload
    ///
    /// The payload is written into the request's isolation directory first,
    /// named `id.<ext>` after its detected format.
    pub fn process_bytes(&self, bytes: &[u8], request_id: &str) -> ExtractionResult {
        let span = info_span!("request", request_id = %request_id);
        let _enter = span.enter();
        let start = Instant::now();

        let result = RequestContext::create(&self.config.work_dir, request_id).and_then(|ctx| {
            let format = validate_image_bytes(bytes)?;
            let input = ctx
                .isolation_dir()
                .join(format!("{}.{}", UPLOAD_STEM, format_to_extension(format)));
            fs::write(&input, bytes)?;
            self.guarded(&ctx, &input)
        });

        self.finish(result, start)
    }

    /// Run the stages, turning a panic into an internal failure
    fn guarded(
        &self,
        ctx: &RequestContext,
        image_path: &Path,
    ) -> Result<ExtractedFields, PipelineError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run(ctx, image_path)))
            .unwrap_or_else(|payload| Err(PipelineError::Panic(panic_message(payload.as_ref()))))
    }

    fn finish(
        &self,
        result: Result<ExtractedFields, PipelineError>,
        start: Instant,
    ) -> ExtractionResult {
        let elapsed = start.elapsed().as_millis();
        match &result {
            Ok(_) => info!("✓ Total: {}ms", elapsed),
            Err(e) => match e.kind() {
                FailureKind::InvalidPhoto => {
                    warn!("Invalid ID card photo after {}ms: {}", elapsed, e)
                }
                FailureKind::IncompleteExtraction => {
                    warn!("Incomplete extraction after {}ms: {}", elapsed, e)
                }
                FailureKind::Internal => error!("✗ Failed after {}ms: {}", elapsed, e),
            },
        }
        result.into()
    }

    fn run(
        &self,
        ctx: &RequestContext,
        image_path: &Path,
    ) -> Result<ExtractedFields, PipelineError> {
        let mut timings = Timings::default();
        let mut stage = Stage::Init;
        debug!("{} {}", stage, image_path.display());

        // DETECT
        stage = Stage::Detect;
        let t = Instant::now();
        let image = load_image(image_path)?;
        let detections = self
            .detector
            .detect(&image, self.config.confidence_threshold, self.config.iou_threshold)
            .map_err(|e| PipelineError::stage(stage, e))?;
        timings.detection = t.elapsed().as_millis();
        info!("Detection: {} boxes in {}ms", detections.len(), timings.detection);

        // SELECT
        stage = Stage::Select;
        let selection = self.selector.select(&detections)?;
        debug!(
            "{}: card region {}",
            stage,
            if selection.id_card.is_some() { "found" } else { "absent" }
        );

        // CROP
        stage = Stage::Crop;
        let t = Instant::now();
        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.png");
        let saved = save_crops(&image, &selection, &ctx.crops_dir(), file_name)
            .map_err(|e| PipelineError::stage(stage, e))?;
        timings.cropping = t.elapsed().as_millis();
        debug!("Cropping: {}ms", timings.cropping);

        let missing = saved.missing_fields();
        if !missing.is_empty() {
            return Err(PipelineError::IncompleteExtraction {
                missing: missing.iter().map(|s| s.dir_name().to_string()).collect(),
            });
        }

        // RECOGNIZE_TEXT
        stage = Stage::RecognizeText;
        let t = Instant::now();
        let mut texts = Vec::with_capacity(3);
        for path in saved.fields.iter().flatten() {
            let crop = load_image(path)?;
            let fragments = self
                .recognizer
                .recognize(&crop)
                .map_err(|e| PipelineError::stage(stage, e))?;
            texts.push(join_fragments(&fragments));
        }
        timings.recognition = t.elapsed().as_millis();
        info!("OCR: {}ms", timings.recognition);

        // EXTRACT_DIGITS
        stage = Stage::ExtractDigits;
        let id_number = match saved.id_card.as_deref().filter(|p| p.exists()) {
            Some(path) => {
                let t = Instant::now();
                let card = load_image(path)?;
                let number = self
                    .digits
                    .extract(&card)
                    .map_err(|e| PipelineError::stage(stage, e))?;
                timings.id_extraction = t.elapsed().as_millis();
                debug!("ID extraction: {}ms", timings.id_extraction);
                number
            }
            None => String::new(),
        };

        // ASSEMBLE
        stage = Stage::Assemble;
        let mut texts = texts.into_iter();
        let fields = ExtractedFields {
            first_name: texts.next().unwrap_or_default(),
            second_name: texts.next().unwrap_or_default(),
            location: texts.next().unwrap_or_default(),
            id_number,
        };
        debug!("{} -> {} {:?}", stage, Stage::Done, timings);

        Ok(fields)
    }
}

/// Join recognized fragments with single spaces in right-to-left reading order
pub fn join_fragments(fragments: &[String]) -> String {
    fragments
        .iter()
        .rev()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
