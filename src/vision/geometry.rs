// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Box geometry for detector pre/postprocessing
//!
//! - `LetterboxInfo` - aspect-preserving resize + symmetric padding parameters
//! - `BBox` - corner-form box with IoU and clamping helpers
//! - `nms` / `batched_nms` - greedy non-maximum suppression

use std::collections::BTreeMap;

/// Default IoU threshold used by non-maximum suppression
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Axis-aligned box in corner form `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }

    /// Clamp all coordinates into `[0, width] x [0, height]`
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Convert a centre-form box `(cx, cy, w, h)` into corner form
pub fn xywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> BBox {
    // Negative extents still yield x1 <= x2 and y1 <= y2
    let half_w = w.abs() / 2.0;
    let half_h = h.abs() / 2.0;
    BBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
}

/// Parameters of a letterbox transform
///
/// Records everything needed to map boxes from model input space back
/// to the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    /// Uniform scale ratio applied to the source image
    pub scale: f32,
    /// Left padding in pixels
    pub pad_x: f32,
    /// Top padding in pixels
    pub pad_y: f32,
    /// Width of the resized (unpadded) content
    pub resized_width: u32,
    /// Height of the resized (unpadded) content
    pub resized_height: u32,
    /// Source image width
    pub original_width: u32,
    /// Source image height
    pub original_height: u32,
    /// Padded output width
    pub target_width: u32,
    /// Padded output height
    pub target_height: u32,
}

impl LetterboxInfo {
    /// Compute the letterbox parameters for a source of `width x height`
    /// fitted into `target_width x target_height`.
    ///
    /// The odd pixel of padding goes to the right/bottom edge.
    pub fn compute(width: u32, height: u32, target_width: u32, target_height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self {
                scale: 1.0,
                pad_x: 0.0,
                pad_y: 0.0,
                resized_width: 0,
                resized_height: 0,
                original_width: width,
                original_height: height,
                target_width,
                target_height,
            };
        }

        let scale = (target_height as f32 / height as f32).min(target_width as f32 / width as f32);

        let resized_width = ((width as f32 * scale).round() as u32).clamp(1, target_width);
        let resized_height = ((height as f32 * scale).round() as u32).clamp(1, target_height);

        let pad_x = (target_width - resized_width) / 2;
        let pad_y = (target_height - resized_height) / 2;

        Self {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            resized_width,
            resized_height,
            original_width: width,
            original_height: height,
            target_width,
            target_height,
        }
    }

    /// Map a box from padded model space back to original pixel space,
    /// clamped to the original image bounds
    pub fn unmap(&self, bbox: &BBox) -> BBox {
        let x1 = (bbox.x1 - self.pad_x) / self.scale;
        let y1 = (bbox.y1 - self.pad_y) / self.scale;
        let x2 = (bbox.x2 - self.pad_x) / self.scale;
        let y2 = (bbox.y2 - self.pad_y) / self.scale;

        BBox::new(x1, y1, x2, y2).clamp(self.original_width as f32, self.original_height as f32)
    }

    /// Map a box from original pixel space into padded model space
    pub fn map(&self, bbox: &BBox) -> BBox {
        BBox::new(
            bbox.x1 * self.scale + self.pad_x,
            bbox.y1 * self.scale + self.pad_y,
            bbox.x2 * self.scale + self.pad_x,
            bbox.y2 * self.scale + self.pad_y,
        )
    }
}

/// Greedy non-maximum suppression
///
/// Returns indices of kept boxes ordered by descending score. A box is
/// discarded when its IoU with an already kept box exceeds `iou_threshold`.
pub fn nms(boxes: &[BBox], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for (pos, &idx) in order.iter().enumerate() {
        if suppressed[idx] {
            continue;
        }
        keep.push(idx);

        for &other in &order[pos + 1..] {
            if !suppressed[other] && boxes[idx].iou(&boxes[other]) > iou_threshold {
                suppressed[other] = true;
            }
        }
    }

    keep
}

/// Non-maximum suppression run independently within each class
///
/// Boxes of different classes never suppress each other. Returned indices
/// are sorted ascending, preserving the input order.
pub fn batched_nms(
    boxes: &[BBox],
    scores: &[f32],
    class_ids: &[u32],
    iou_threshold: f32,
) -> Vec<usize> {
    let mut by_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, &class_id) in class_ids.iter().enumerate().take(boxes.len()) {
        by_class.entry(class_id).or_default().push(idx);
    }

    let mut keep = Vec::new();
    for members in by_class.values() {
        let class_boxes: Vec<BBox> = members.iter().map(|&i| boxes[i]).collect();
        let class_scores: Vec<f32> = members.iter().map(|&i| scores[i]).collect();

        keep.extend(
            nms(&class_boxes, &class_scores, iou_threshold)
                .into_iter()
                .map(|local| members[local]),
        );
    }

    keep.sort_unstable();
    keep
}
