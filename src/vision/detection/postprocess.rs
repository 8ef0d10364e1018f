// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decoding of raw YOLO prediction tensors into pixel-space detections

use anyhow::Result;
use ndarray::{ArrayViewD, Axis, Ix3};
use tracing::debug;

use super::metadata::ModelMetadata;
use crate::vision::geometry::{batched_nms, xywh_to_xyxy, BBox, LetterboxInfo};

/// A detected object in original image coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Corner-form box, clamped to the source image
    pub bbox: BBox,
    /// Best class score (0.0-1.0)
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: String,
}

/// Thresholds applied while decoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessParams {
    /// Detections scoring at or below this are dropped
    pub confidence_threshold: f32,
    /// IoU above which same-class boxes are suppressed
    pub iou_threshold: f32,
}

/// Which axis of `[1, A, B]` holds the `4 + nc` features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// `[1, 4 + nc, N]`
    FeaturesFirst,
    /// `[1, N, 4 + nc]`
    FeaturesLast,
}

fn detect_layout(shape: &[usize], num_classes: usize) -> Result<Layout> {
    if shape.len() != 3 {
        anyhow::bail!(
            "Unexpected prediction shape {:?}, expected rank 3 [1, 4+nc, N]",
            shape
        );
    }
    if shape[0] != 1 {
        anyhow::bail!("Unexpected batch size {} in prediction tensor", shape[0]);
    }

    let features = 4 + num_classes;
    if shape[1] == features {
        Ok(Layout::FeaturesFirst)
    } else if shape[2] == features {
        Ok(Layout::FeaturesLast)
    } else {
        anyhow::bail!(
            "Prediction shape {:?} does not match {} classes (expected a {} feature axis)",
            shape,
            num_classes,
            features
        )
    }
}

/// Turn a raw prediction tensor into filtered, de-duplicated detections
///
/// Steps:
/// 1. Split box rows `(cx, cy, w, h)` from class scores
/// 2. Keep the best class per candidate, drop scores `<= confidence_threshold`
/// 3. Convert to corner form and run per-class NMS
/// 4. Unmap survivors into original pixel space
///
/// Output is ordered by candidate index in the tensor.
pub fn postprocess(
    predictions: ArrayViewD<f32>,
    letterbox: &LetterboxInfo,
    metadata: &ModelMetadata,
    params: PostprocessParams,
) -> Result<Vec<Detection>> {
    let num_classes = metadata.num_classes();
    let layout = detect_layout(predictions.shape(), num_classes)?;

    let preds = predictions.into_dimensionality::<Ix3>()?;
    let preds = preds.index_axis_move(Axis(0), 0);
    // rows = features, columns = candidates
    let preds = match layout {
        Layout::FeaturesFirst => preds,
        Layout::FeaturesLast => preds.reversed_axes(),
    };

    let num_candidates = preds.shape()[1];

    let mut boxes = Vec::new();
    let mut scores = Vec::new();
    let mut class_ids = Vec::new();

    for i in 0..num_candidates {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..num_classes {
            let score = preds[[4 + c, i]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score <= params.confidence_threshold {
            continue;
        }

        boxes.push(xywh_to_xyxy(
            preds[[0, i]],
            preds[[1, i]],
            preds[[2, i]],
            preds[[3, i]],
        ));
        scores.push(best_score);
        class_ids.push(best_class as u32);
    }

    let keep = batched_nms(&boxes, &scores, &class_ids, params.iou_threshold);

    debug!(
        "Postprocess: {} candidates, {} above {:.2}, {} after NMS",
        num_candidates,
        boxes.len(),
        params.confidence_threshold,
        keep.len()
    );

    Ok(keep
        .into_iter()
        .map(|idx| Detection {
            bbox: letterbox.unmap(&boxes[idx]),
            confidence: scores[idx],
            class_id: class_ids[idx],
            class_name: metadata.class_name(class_ids[idx]),
        })
        .collect())
}
