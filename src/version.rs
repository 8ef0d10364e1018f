// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the ID card OCR service

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-onnx-pipeline-2025-11-02";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.0.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 1;

/// Minor version number
pub const VERSION_MINOR: u32 = 0;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2025-11-02";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "region-detection",
    "digit-detection",
    "ctc-recognition",
    "request-isolation",
    "http-gateway",
    "message-consumer",
    "model-preload",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("ID Card OCR {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for diagnostics
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
