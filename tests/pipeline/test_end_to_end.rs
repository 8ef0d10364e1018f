// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end extraction with synthetic detector and recognizer engines

use crate::support::*;
use id_card_ocr::pipeline::ExtractionResult;
use tempfile::TempDir;

#[test]
fn test_extracts_all_fields_from_bytes() {
    let tmp = TempDir::new().unwrap();
    let work = tmp.path().join("work");
    let pipeline = pipeline(standard_models(), &work);

    let result = pipeline.process_bytes(&png_bytes(&standard_card()), "req-1");

    let fields = result.fields().expect("extraction should succeed");
    assert_eq!(fields.first_name, color_text(FIRST_COLOR));
    assert_eq!(fields.second_name, color_text(SECOND_COLOR));
    assert_eq!(fields.location, color_text(LOCATION_COLOR));
    assert_eq!(fields.id_number, ID_NUMBER);

    assert!(!work.join("req-1").exists());
    assert_eq!(leftover_entries(&work), 0);
}

#[test]
fn test_extracts_from_file_on_disk() {
    let tmp = TempDir::new().unwrap();
    let work = tmp.path().join("work");
    let input = tmp.path().join("card.png");
    standard_card().save(&input).unwrap();

    let result = pipeline(standard_models(), &work).process(&input, "from-disk");

    assert!(result.is_success());
    assert!(input.exists(), "caller's file must not be removed");
    assert!(!work.join("from-disk").exists());
}

#[test]
fn test_extracts_from_file_with_foreign_extension() {
    let tmp = TempDir::new().unwrap();
    let work = tmp.path().join("work");
    let pipeline = pipeline(standard_models(), &work);

    // PNG content behind extensions whose encoders cannot write the crops
    for name in ["card.ico", "card.hdr"] {
        let input = tmp.path().join(name);
        std::fs::write(&input, png_bytes(&standard_card())).unwrap();

        let result = pipeline.process(&input, "foreign-ext");

        let fields = result.fields().expect("extraction should succeed");
        assert_eq!(fields.first_name, color_text(FIRST_COLOR));
        assert_eq!(fields.id_number, ID_NUMBER);
    }
    assert_eq!(leftover_entries(&work), 0);
}

#[test]
fn test_fields_follow_vertical_order_not_class_order() {
    let tmp = TempDir::new().unwrap();
    let work = tmp.path().join("work");

    // Same rectangles, but the classes are shuffled and listed bottom-up
    let mut candidates = standard_candidates();
    candidates.reverse();
    candidates[0].class = 2;
    candidates[2].class = 4;
    let models = models_with(region_detector(candidates));

    let result = pipeline(models, &work).process_bytes(&png_bytes(&standard_card()), "order");
    let fields = result.fields().unwrap();
    assert_eq!(fields.first_name, color_text(FIRST_COLOR));
    assert_eq!(fields.location, color_text(LOCATION_COLOR));
}

#[test]
fn test_missing_card_region_leaves_id_empty() {
    let tmp = TempDir::new().unwrap();
    let work = tmp.path().join("work");
    let candidates: Vec<Candidate> = standard_candidates()
        .into_iter()
        .filter(|c| c.class != 0)
        .collect();

    let result = pipeline(models_with(region_detector(candidates)), &work)
        .process_bytes(&png_bytes(&standard_card()), "no-card");

    match result {
        ExtractionResult::Success(fields) => {
            assert_eq!(fields.id_number, "");
            assert_eq!(fields.first_name, color_text(FIRST_COLOR));
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[test]
fn test_sequential_requests_reuse_work_dir() {
    let tmp = TempDir::new().unwrap();
    let work = tmp.path().join("work");
    let pipeline = pipeline(standard_models(), &work);
    let bytes = png_bytes(&standard_card());

    for i in 0..3 {
        assert!(pipeline.process_bytes(&bytes, &format!("seq-{}", i)).is_success());
    }
    // The same id may be reused once its previous request has finished
    assert!(pipeline.process_bytes(&bytes, "seq-0").is_success());
    assert_eq!(leftover_entries(&work), 0);
}
