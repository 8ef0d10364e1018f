// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the region and digit detectors

use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

use crate::vision::geometry::LetterboxInfo;

/// Default square input size for the detectors
pub const DETECTOR_INPUT_SIZE: u32 = 640;

/// Grey used for letterbox padding (YOLO convention)
pub const PAD_COLOR: Rgb<u8> = Rgb([114, 114, 114]);

/// Model input tensor together with the transform that produced it
#[derive(Debug, Clone)]
pub struct PreparedInput {
    /// NCHW tensor `[1, 3, H, W]`, RGB, values in [0, 1]
    pub tensor: Array4<f32>,
    /// Parameters needed to map detections back to the source image
    pub letterbox: LetterboxInfo,
}

/// Resize with aspect ratio preservation and symmetric padding
///
/// The image is scaled by `min(target_h / h, target_w / w)` and centred on a
/// `pad_color` canvas of exactly `target_width x target_height`.
pub fn letterbox(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    pad_color: Rgb<u8>,
) -> (RgbImage, LetterboxInfo) {
    let (orig_w, orig_h) = image.dimensions();
    let info = LetterboxInfo::compute(orig_w, orig_h, target_width, target_height);

    let mut output = RgbImage::from_pixel(target_width, target_height, pad_color);

    if orig_w == 0 || orig_h == 0 {
        return (output, info);
    }

    let resized = image
        .resize_exact(info.resized_width, info.resized_height, FilterType::Triangle)
        .to_rgb8();

    image::imageops::replace(
        &mut output,
        &resized,
        info.pad_x as i64,
        info.pad_y as i64,
    );

    (output, info)
}

/// Preprocess an image for a detector
///
/// Steps:
/// 1. Letterbox to `target_width x target_height`
/// 2. Scale pixels to [0, 1]
/// 3. Lay out as NCHW `[1, 3, H, W]`
pub fn preprocess_for_detector(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
) -> PreparedInput {
    let (padded, letterbox) = letterbox(image, target_width, target_height, PAD_COLOR);

    let mut tensor = Array4::zeros((1, 3, target_height as usize, target_width as usize));

    for (x, y, pixel) in padded.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    PreparedInput { tensor, letterbox }
}
