// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Maps detections to card fields
//!
//! Card and photo detections are set aside; the three remaining boxes
//! closest to the top of the card are, in order, first name, second name
//! and location. The card detection itself is kept as the ID-number source.

use serde::Serialize;

use super::errors::SelectionError;
use crate::vision::Detection;

/// Class name of the whole-card detection
pub const DEFAULT_CARD_CLASS: &str = "egyptian-id";

/// Class name of the portrait detection
pub const DEFAULT_PHOTO_CLASS: &str = "pic";

/// A detection with the derived values used for selection
#[derive(Debug, Clone, PartialEq)]
pub struct BoxInfo {
    pub detection: Detection,
    pub center_x: f32,
    pub center_y: f32,
    pub area: f32,
}

impl From<Detection> for BoxInfo {
    fn from(detection: Detection) -> Self {
        let bbox = detection.bbox;
        Self {
            center_x: bbox.center_x(),
            center_y: bbox.center_y(),
            area: bbox.area(),
            detection,
        }
    }
}

/// Field slots on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSlot {
    FirstName,
    SecondName,
    Location,
    IdNumber,
}

impl FieldSlot {
    /// Text slots in top-to-bottom order
    pub const TEXT: [FieldSlot; 3] = [
        FieldSlot::FirstName,
        FieldSlot::SecondName,
        FieldSlot::Location,
    ];

    /// Folder name under `crops/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            FieldSlot::FirstName => "1",
            FieldSlot::SecondName => "2",
            FieldSlot::Location => "3",
            FieldSlot::IdNumber => "id",
        }
    }
}

/// Result of region selection
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSelection {
    /// First name, second name, location
    pub fields: [BoxInfo; 3],
    /// Whole-card box used for digit extraction
    pub id_card: Option<BoxInfo>,
}

/// Deterministic field assignment heuristic
#[derive(Debug, Clone)]
pub struct RegionSelector {
    card_class: String,
    photo_class: String,
}

impl Default for RegionSelector {
    fn default() -> Self {
        Self::new(DEFAULT_CARD_CLASS, DEFAULT_PHOTO_CLASS)
    }
}

impl RegionSelector {
    pub fn new(card_class: impl Into<String>, photo_class: impl Into<String>) -> Self {
        Self {
            card_class: card_class.into(),
            photo_class: photo_class.into(),
        }
    }

    /// Assign detections to field slots
    ///
    /// # Errors
    /// - `NoBoxesDetected` when `detections` is empty
    /// - `InsufficientTextBoxes` when fewer than three non-card, non-photo
    ///   detections remain
    pub fn select(&self, detections: &[Detection]) -> Result<RegionSelection, SelectionError> {
        if detections.is_empty() {
            return Err(SelectionError::NoBoxesDetected);
        }

        let mut candidates: Vec<BoxInfo> = detections
            .iter()
            .filter(|d| d.class_name != self.card_class && d.class_name != self.photo_class)
            .cloned()
            .map(BoxInfo::from)
            .collect();

        if candidates.len() < 3 {
            return Err(SelectionError::InsufficientTextBoxes {
                found: candidates.len(),
            });
        }

        // Stable: ties keep detection order
        candidates.sort_by(|a, b| a.center_y.total_cmp(&b.center_y));
        candidates.truncate(3);

        let fields: [BoxInfo; 3] = candidates
            .try_into()
            .map_err(|v: Vec<BoxInfo>| SelectionError::InsufficientTextBoxes { found: v.len() })?;

        let id_card = detections
            .iter()
            .find(|d| d.class_name == self.card_class)
            .cloned()
            .map(BoxInfo::from);

        Ok(RegionSelection { fields, id_card })
    }
}
