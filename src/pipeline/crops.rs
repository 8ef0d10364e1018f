// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Writes selected regions to `crops/<slot>/<file name>`

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::selector::{BoxInfo, FieldSlot, RegionSelection};
use crate::vision::image_utils::format_for_path;
use crate::vision::BBox;

/// Paths written for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedCrops {
    /// First name, second name, location (None when the region was degenerate)
    pub fields: [Option<PathBuf>; 3],
    pub id_card: Option<PathBuf>,
}

impl SavedCrops {
    /// Text slots whose crop file is not on disk
    pub fn missing_fields(&self) -> Vec<FieldSlot> {
        FieldSlot::TEXT
            .iter()
            .zip(self.fields.iter())
            .filter(|(_, path)| !path.as_deref().is_some_and(Path::exists))
            .map(|(slot, _)| *slot)
            .collect()
    }
}

/// Cut `bbox` out of `image`
///
/// Coordinates are clamped to the image and truncated toward zero. Returns
/// `None` when the clamped region is empty.
pub fn crop_region(image: &DynamicImage, bbox: &BBox) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();
    let clamped = bbox.clamp(width as f32, height as f32);

    let x1 = clamped.x1 as u32;
    let y1 = clamped.y1 as u32;
    let x2 = clamped.x2 as u32;
    let y2 = clamped.y2 as u32;

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(image.crop_imm(x1, y1, x2 - x1, y2 - y1))
}

fn save_slot(
    image: &DynamicImage,
    info: &BoxInfo,
    crops_dir: &Path,
    slot: FieldSlot,
    file_name: &str,
) -> Result<Option<PathBuf>> {
    let Some(crop) = crop_region(image, &info.detection.bbox) else {
        warn!(
            "Skipping degenerate {} region {:?} ({})",
            slot.dir_name(),
            info.detection.bbox,
            info.detection.class_name
        );
        return Ok(None);
    };

    let slot_dir = crops_dir.join(slot.dir_name());
    fs::create_dir_all(&slot_dir)
        .with_context(|| format!("Failed to create {}", slot_dir.display()))?;

    let path = slot_dir.join(file_name);
    DynamicImage::ImageRgb8(crop.to_rgb8())
        .save_with_format(&path, format_for_path(&path))
        .with_context(|| format!("Failed to write crop {}", path.display()))?;

    debug!(
        "Saved {} crop ({}) to {}",
        slot.dir_name(),
        info.detection.class_name,
        path.display()
    );

    Ok(Some(path))
}

/// Persist the three field crops and, when present, the card crop
pub fn save_crops(
    image: &DynamicImage,
    selection: &RegionSelection,
    crops_dir: &Path,
    file_name: &str,
) -> Result<SavedCrops> {
    let mut saved = SavedCrops::default();

    for (i, (slot, info)) in FieldSlot::TEXT.iter().zip(selection.fields.iter()).enumerate() {
        saved.fields[i] = save_slot(image, info, crops_dir, *slot, file_name)?;
    }

    if let Some(card) = &selection.id_card {
        saved.id_card = save_slot(image, card, crops_dir, FieldSlot::IdNumber, file_name)?;
    }

    Ok(saved)
}
