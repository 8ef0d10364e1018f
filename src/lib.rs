// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod messaging;
pub mod pipeline;
pub mod version;
pub mod vision;

pub use config::ServiceConfig;
pub use pipeline::{ExtractedFields, ExtractionResult, FailureKind, IdCardPipeline, PipelineConfig};
pub use vision::{LoadedModels, ModelRegistry, ModelStatus};
