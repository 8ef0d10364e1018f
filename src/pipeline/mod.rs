// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection-to-extraction pipeline
//!
//! Region selection, crop persistence, digit assembly and the per-request
//! orchestrator that ties them to the vision models.

pub mod context;
pub mod crops;
pub mod digits;
pub mod errors;
pub mod orchestrator;
pub mod result;
pub mod selector;

pub use context::{validate_request_id, RequestContext};
pub use crops::{crop_region, save_crops, SavedCrops};
pub use digits::{assemble_digits, DigitAssembler, DEFAULT_DIGIT_CONFIDENCE};
pub use errors::{FailureKind, PipelineError, SelectionError, Stage};
pub use orchestrator::{
    join_fragments, IdCardPipeline, PipelineConfig, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use result::{ExtractedFields, ExtractionResult};
pub use selector::{
    BoxInfo, FieldSlot, RegionSelection, RegionSelector, DEFAULT_CARD_CLASS, DEFAULT_PHOTO_CLASS,
};
