// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Consumer replies, acknowledgements and prefetch-1 ordering

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::support::*;
use id_card_ocr::messaging::{ConsumerStats, Delivery, OcrConsumer, Reply, ReplyChannel};
use id_card_ocr::vision::LoadedModels;

#[derive(Debug, Clone, PartialEq)]
struct Published {
    reply_to: String,
    correlation_id: Option<String>,
    body: Value,
}

/// Records everything the consumer sends to the broker
#[derive(Default)]
struct RecordingChannel {
    published: Mutex<Vec<Published>>,
    acked: Mutex<Vec<u64>>,
    fail_publish: bool,
}

#[async_trait]
impl ReplyChannel for RecordingChannel {
    async fn publish(
        &self,
        reply_to: &str,
        correlation_id: Option<&str>,
        body: Vec<u8>,
    ) -> Result<()> {
        if self.fail_publish {
            anyhow::bail!("broker unavailable");
        }
        self.published.lock().unwrap().push(Published {
            reply_to: reply_to.to_string(),
            correlation_id: correlation_id.map(str::to_string),
            body: serde_json::from_slice(&body)?,
        });
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        self.acked.lock().unwrap().push(delivery_tag);
        Ok(())
    }
}

fn consumer(
    models: LoadedModels,
    work_dir: &std::path::Path,
) -> (OcrConsumer, Arc<RecordingChannel>) {
    let channel = Arc::new(RecordingChannel::default());
    let consumer = OcrConsumer::new(registry_with(models), test_config(work_dir), channel.clone());
    (consumer, channel)
}

fn delivery(tag: u64, body: Value, reply_to: Option<&str>) -> Delivery {
    Delivery {
        delivery_tag: tag,
        body: body.to_string().into_bytes(),
        correlation_id: Some(format!("corr-{}", tag)),
        reply_to: reply_to.map(str::to_string),
    }
}

fn card_base64() -> String {
    STANDARD.encode(png_bytes(&standard_card()))
}

#[tokio::test]
async fn test_health_check_envelope() {
    let tmp = TempDir::new().unwrap();
    let (consumer, channel) = consumer(standard_models(), tmp.path());

    let body = json!({"pattern": "ocr.isUp", "data": {}, "id": "x"});
    let reply = consumer
        .process_delivery(delivery(1, body, Some("replies")))
        .await;

    assert_eq!(reply, Reply::health());
    let published = channel.published.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].reply_to, "replies");
    assert_eq!(published[0].correlation_id.as_deref(), Some("corr-1"));
    assert_eq!(published[0].body, json!({"status": "OCR Service is running"}));
    assert_eq!(*channel.acked.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn test_envelope_extraction_reply() {
    let tmp = TempDir::new().unwrap();
    let (consumer, channel) = consumer(standard_models(), tmp.path());

    let body = json!({
        "pattern": "ocr.process",
        "data": { "image_base64": card_base64() },
        "id": "abc"
    });
    consumer.process_delivery(delivery(5, body, Some("replies"))).await;

    let published = channel.published.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].correlation_id.as_deref(), Some("corr-5"));
    let reply = &published[0].body;
    assert_eq!(reply["firstName"], color_text(FIRST_COLOR));
    assert_eq!(reply["lastName"], color_text(SECOND_COLOR));
    assert_eq!(reply["location"], color_text(LOCATION_COLOR));
    assert_eq!(reply["socialSecurityNumber"], ID_NUMBER);
    assert_eq!(leftover_entries(tmp.path()), 0);
}

#[tokio::test]
async fn test_bare_payload_extraction_reply() {
    let tmp = TempDir::new().unwrap();
    let (consumer, _channel) = consumer(standard_models(), tmp.path());

    let reply = consumer
        .process_delivery(delivery(1, json!({ "image_base64": card_base64() }), Some("r")))
        .await;

    assert!(matches!(reply, Reply::Extracted(_)));
}

#[tokio::test]
async fn test_failures_reply_invalid_photo_and_ack() {
    let tmp = TempDir::new().unwrap();
    let (consumer, channel) = consumer(models_with(region_detector(Vec::new())), tmp.path());

    let bodies = vec![
        Delivery {
            delivery_tag: 1,
            body: b"{not json".to_vec(),
            correlation_id: Some("c1".to_string()),
            reply_to: Some("r".to_string()),
        },
        delivery(2, json!({"data": {}}), Some("r")),
        delivery(3, json!({"image_base64": "@@@"}), Some("r")),
        delivery(4, json!({"image_base64": card_base64()}), Some("r")),
    ];
    for d in bodies {
        let reply = consumer.process_delivery(d).await;
        assert!(reply.is_error());
    }

    let published = channel.published.lock().unwrap().clone();
    assert_eq!(published.len(), 4);
    for p in &published {
        assert_eq!(p.body, json!({"error": "Invalid ID photo"}));
    }
    assert_eq!(*channel.acked.lock().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(leftover_entries(tmp.path()), 0);
}

#[tokio::test]
async fn test_missing_reply_to_still_acks() {
    let tmp = TempDir::new().unwrap();
    let (consumer, channel) = consumer(standard_models(), tmp.path());

    consumer
        .process_delivery(delivery(9, json!({"pattern": {"cmd": "ocr.isUp"}}), None))
        .await;

    assert!(channel.published.lock().unwrap().is_empty());
    assert_eq!(*channel.acked.lock().unwrap(), vec![9]);
}

#[tokio::test]
async fn test_publish_failure_still_acks() {
    let tmp = TempDir::new().unwrap();
    let channel = Arc::new(RecordingChannel {
        fail_publish: true,
        ..Default::default()
    });
    let consumer = OcrConsumer::new(
        registry_with(standard_models()),
        test_config(tmp.path()),
        channel.clone(),
    );

    consumer
        .process_delivery(delivery(3, json!({"pattern": "ocr.isUp"}), Some("r")))
        .await;

    assert_eq!(*channel.acked.lock().unwrap(), vec![3]);
}

#[tokio::test]
async fn test_run_processes_in_order() {
    let tmp = TempDir::new().unwrap();
    let (consumer, channel) = consumer(standard_models(), tmp.path());

    let deliveries = vec![
        delivery(1, json!({"pattern": "ocr.isUp"}), Some("r")),
        delivery(2, json!({"image_base64": card_base64()}), Some("r")),
        delivery(3, json!({"unexpected": true}), Some("r")),
    ];
    let stats = consumer.run(futures::stream::iter(deliveries)).await;

    assert_eq!(
        stats,
        ConsumerStats {
            received: 3,
            succeeded: 1,
            failed: 1,
            health_checks: 1,
        }
    );
    assert_eq!(*channel.acked.lock().unwrap(), vec![1, 2, 3]);
    let correlation: Vec<Option<String>> = channel
        .published
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.correlation_id.clone())
        .collect();
    assert_eq!(
        correlation,
        vec![
            Some("corr-1".to_string()),
            Some("corr-2".to_string()),
            Some("corr-3".to_string())
        ]
    );
}
