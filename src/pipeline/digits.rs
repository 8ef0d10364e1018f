// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ID number extraction from the card crop

use anyhow::Result;
use image::DynamicImage;
use tracing::debug;

use crate::vision::{Detection, Detector};

/// Default confidence threshold for digit detections
pub const DEFAULT_DIGIT_CONFIDENCE: f32 = 0.25;

/// Concatenate digit class names ordered left to right by box centre
pub fn assemble_digits(detections: &[Detection]) -> String {
    let mut ordered: Vec<&Detection> = detections.iter().collect();
    ordered.sort_by(|a, b| a.bbox.center_x().total_cmp(&b.bbox.center_x()));
    ordered.iter().map(|d| d.class_name.as_str()).collect()
}

/// Runs the digit detector and reads the number
#[derive(Debug, Clone)]
pub struct DigitAssembler {
    detector: Detector,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl DigitAssembler {
    pub fn new(detector: Detector, confidence_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            detector,
            confidence_threshold,
            iou_threshold,
        }
    }

    /// Read the ID number from a card crop; empty when no digit is found
    pub fn extract(&self, card: &DynamicImage) -> Result<String> {
        let detections = self
            .detector
            .detect(card, self.confidence_threshold, self.iou_threshold)?;
        let number = assemble_digits(&detections);
        debug!("Read {} digits from card crop", detections.len());
        Ok(number)
    }
}
