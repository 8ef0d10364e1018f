// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/support/mod.rs - Synthetic engines and fixtures shared by integration tests

#![allow(dead_code)]

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{Array3, Array4, ArrayD};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use id_card_ocr::pipeline::{IdCardPipeline, PipelineConfig};
use id_card_ocr::vision::{
    DetectionEngine, Detector, LoadedModels, ModelMetadata, ModelRegistry, TextRecognizer,
};

/// Region classes in model index order
pub const REGION_CLASSES: [&str; 5] = ["egyptian-id", "pic", "firstName", "secondName", "location"];

pub const CARD_WIDTH: u32 = 640;
pub const CARD_HEIGHT: u32 = 400;

/// 640x400 letterboxes to 640x640 with scale 1 and 120px of padding on top
pub const PAD_Y: f32 = 120.0;

/// Digits reported by the default digit engine
pub const ID_NUMBER: &str = "2990101";

/// One synthetic prediction: class index and model-space `(cx, cy, w, h)`
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub class: usize,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub score: f32,
}

impl Candidate {
    /// Candidate given in source image coordinates
    pub fn at(class: usize, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            class,
            cx: (x1 + x2) / 2.0,
            cy: (y1 + y2) / 2.0 + PAD_Y,
            w: x2 - x1,
            h: y2 - y1,
            score: 0.9,
        }
    }
}

/// Field rectangles in source coordinates: first name, second name, location
pub const FIELD_RECTS: [(f32, f32, f32, f32); 3] = [
    (100.0, 40.0, 500.0, 80.0),
    (100.0, 120.0, 500.0, 160.0),
    (100.0, 200.0, 500.0, 240.0),
];

/// Card, portrait and the three text fields
pub fn standard_candidates() -> Vec<Candidate> {
    let mut candidates = vec![
        Candidate::at(0, 20.0, 20.0, 620.0, 380.0),
        Candidate::at(1, 520.0, 250.0, 600.0, 350.0),
    ];
    for (i, (x1, y1, x2, y2)) in FIELD_RECTS.iter().enumerate() {
        candidates.push(Candidate::at(2 + i, *x1, *y1, *x2, *y2));
    }
    candidates
}

/// Detection engine replaying fixed candidates in `[1, 4+nc, N]` layout
pub struct ScriptedEngine {
    num_classes: usize,
    candidates: Vec<Candidate>,
}

impl ScriptedEngine {
    pub fn new(num_classes: usize, candidates: Vec<Candidate>) -> Self {
        Self {
            num_classes,
            candidates,
        }
    }
}

impl DetectionEngine for ScriptedEngine {
    fn infer(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let mut out = Array3::<f32>::zeros((1, 4 + self.num_classes, self.candidates.len()));
        for (i, c) in self.candidates.iter().enumerate() {
            out[[0, 0, i]] = c.cx;
            out[[0, 1, i]] = c.cy;
            out[[0, 2, i]] = c.w;
            out[[0, 3, i]] = c.h;
            out[[0, 4 + c.class, i]] = c.score;
        }
        Ok(out.into_dyn())
    }
}

pub struct PanickingEngine;

impl DetectionEngine for PanickingEngine {
    fn infer(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
        panic!("inference crashed")
    }
}

pub fn region_detector(candidates: Vec<Candidate>) -> Detector {
    Detector::new(
        Arc::new(ScriptedEngine::new(REGION_CLASSES.len(), candidates)),
        ModelMetadata::from_names(&REGION_CLASSES),
    )
}

/// Digit detector emitting `digits` right to left so ordering is exercised
pub fn digit_detector(digits: &str) -> Detector {
    let candidates = digits
        .chars()
        .collect::<Vec<char>>()
        .into_iter()
        .enumerate()
        .rev()
        .map(|(i, c)| Candidate {
            class: c.to_digit(10).unwrap_or(0) as usize,
            cx: 40.0 + i as f32 * 60.0,
            cy: 320.0,
            w: 40.0,
            h: 60.0,
            score: 0.8,
        })
        .collect();
    let names: Vec<String> = (0..10).map(|d| d.to_string()).collect();
    Detector::new(
        Arc::new(ScriptedEngine::new(10, candidates)),
        ModelMetadata::from_names(&names),
    )
}

/// Reads a crop's centre pixel back as text fragments `b.., g.., r..`
///
/// Fragments come out in reverse reading order, so a correct join yields
/// `"r<R> g<G> b<B>"`.
pub struct ColorRecognizer;

impl TextRecognizer for ColorRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<String>> {
        let rgb = image.to_rgb8();
        let p = rgb.get_pixel(rgb.width() / 2, rgb.height() / 2);
        Ok(vec![
            format!("b{}", p[2]),
            format!("g{}", p[1]),
            format!("r{}", p[0]),
        ])
    }
}

pub fn color_text(color: Rgb<u8>) -> String {
    format!("r{} g{} b{}", color[0], color[1], color[2])
}

pub const FIRST_COLOR: Rgb<u8> = Rgb([200, 10, 10]);
pub const SECOND_COLOR: Rgb<u8> = Rgb([10, 200, 10]);
pub const LOCATION_COLOR: Rgb<u8> = Rgb([10, 10, 200]);

/// White card with each field rectangle (plus a margin) filled with its colour
pub fn card_image(colors: [Rgb<u8>; 3]) -> DynamicImage {
    let mut img = RgbImage::from_pixel(CARD_WIDTH, CARD_HEIGHT, Rgb([255, 255, 255]));
    for ((x1, y1, x2, y2), color) in FIELD_RECTS.iter().zip(colors) {
        for y in (*y1 as u32 - 10)..(*y2 as u32 + 10) {
            for x in (*x1 as u32 - 10)..(*x2 as u32 + 10) {
                img.put_pixel(x, y, color);
            }
        }
    }
    DynamicImage::ImageRgb8(img)
}

pub fn standard_card() -> DynamicImage {
    card_image([FIRST_COLOR, SECOND_COLOR, LOCATION_COLOR])
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn standard_models() -> LoadedModels {
    models_with(region_detector(standard_candidates()))
}

pub fn models_with(detector: Detector) -> LoadedModels {
    LoadedModels {
        detector,
        digit_detector: digit_detector(ID_NUMBER),
        recognizer: Arc::new(ColorRecognizer),
    }
}

pub fn registry_with(models: LoadedModels) -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::with_models(
        models.detector,
        models.digit_detector,
        models.recognizer,
    ))
}

pub fn test_config(work_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        work_dir: work_dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

pub fn pipeline(models: LoadedModels, work_dir: &Path) -> IdCardPipeline {
    IdCardPipeline::new(models, test_config(work_dir))
}

/// Number of entries left under the work directory
pub fn leftover_entries(work_dir: &Path) -> usize {
    match std::fs::read_dir(work_dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
