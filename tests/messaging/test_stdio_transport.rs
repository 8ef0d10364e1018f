// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Newline-delimited JSON transport driving a real consumer

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use crate::support::*;
use id_card_ocr::messaging::{line_deliveries, LineReplyChannel, OcrConsumer};

#[tokio::test]
async fn test_stdio_round_trip() {
    let tmp = TempDir::new().unwrap();
    let channel = Arc::new(LineReplyChannel::new(Vec::<u8>::new()));
    let consumer = OcrConsumer::new(
        registry_with(standard_models()),
        test_config(tmp.path()),
        channel.clone(),
    );

    let image = STANDARD.encode(png_bytes(&standard_card()));
    let input = [
        json!({"correlation_id": "a", "reply_to": "q", "body": {"pattern": "ocr.isUp"}})
            .to_string(),
        String::new(),
        json!({"correlation_id": "b", "reply_to": "q", "body": {"data": {"image_base64": image}}})
            .to_string(),
        json!({"correlation_id": "c", "body": {"pattern": "ocr.isUp"}}).to_string(),
        "not a delivery".to_string(),
    ]
    .join("\n");

    let stats = consumer.run(line_deliveries(input.as_bytes())).await;
    assert_eq!(stats.received, 4);
    drop(consumer);

    let output = Arc::try_unwrap(channel).ok().unwrap().into_inner();
    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    // Deliveries without a reply address get no line
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["correlation_id"], "a");
    assert_eq!(lines[0]["body"]["status"], "OCR Service is running");
    assert_eq!(lines[1]["correlation_id"], "b");
    assert_eq!(lines[1]["reply_to"], "q");
    assert_eq!(lines[1]["body"]["socialSecurityNumber"], ID_NUMBER);
    assert_eq!(leftover_entries(tmp.path()), 0);
}
