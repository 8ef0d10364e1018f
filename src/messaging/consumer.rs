// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prefetch-1 consumer for ID card extraction requests
//!
//! Deliveries are pulled one at a time; the next is not requested until the
//! current one has been answered and acknowledged. Every delivery is
//! acknowledged, including malformed ones, so nothing is ever requeued.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::message::{InboundMessage, Reply};
use crate::pipeline::{IdCardPipeline, PipelineConfig};
use crate::vision::{decode_base64_payload, ModelRegistry};

/// One message taken from the queue
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
}

/// Broker side of the consumer: reply publishing and acknowledgement
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn publish(
        &self,
        reply_to: &str,
        correlation_id: Option<&str>,
        body: Vec<u8>,
    ) -> Result<()>;

    async fn ack(&self, delivery_tag: u64) -> Result<()>;
}

/// Consumer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub health_checks: u64,
}

pub struct OcrConsumer {
    registry: Arc<ModelRegistry>,
    pipeline_config: PipelineConfig,
    channel: Arc<dyn ReplyChannel>,
}

impl OcrConsumer {
    pub fn new(
        registry: Arc<ModelRegistry>,
        pipeline_config: PipelineConfig,
        channel: Arc<dyn ReplyChannel>,
    ) -> Self {
        Self {
            registry,
            pipeline_config,
            channel,
        }
    }

    /// Consume until the delivery stream ends
    pub async fn run<S>(&self, deliveries: S) -> ConsumerStats
    where
        S: Stream<Item = Delivery>,
    {
        futures::pin_mut!(deliveries);
        let mut stats = ConsumerStats::default();

        info!("✓ OCR Consumer running. Waiting for ID photos...");
        while let Some(delivery) = deliveries.next().await {
            stats.received += 1;
            let reply = self.process_delivery(delivery).await;
            match reply {
                Reply::Health { .. } => stats.health_checks += 1,
                Reply::Error { .. } => stats.failed += 1,
                Reply::Extracted(_) => stats.succeeded += 1,
            }
        }
        info!(
            "Delivery stream closed after {} messages ({} ok, {} failed)",
            stats.received, stats.succeeded, stats.failed
        );

        stats
    }

    /// Answer and acknowledge a single delivery
    pub async fn process_delivery(&self, delivery: Delivery) -> Reply {
        let request_id = Uuid::new_v4().to_string();
        let reply = self.handle(&delivery.body, &request_id).await;

        match delivery.reply_to.as_deref() {
            Some(reply_to) => match reply.to_bytes() {
                Ok(body) => {
                    if let Err(e) = self
                        .channel
                        .publish(reply_to, delivery.correlation_id.as_deref(), body)
                        .await
                    {
                        error!("[{}] Failed to send response: {:#}", request_id, e);
                    }
                }
                Err(e) => error!("[{}] Failed to encode response: {}", request_id, e),
            },
            None => warn!("[{}] No reply_to queue specified, skipping response", request_id),
        }

        if let Err(e) = self.channel.ack(delivery.delivery_tag).await {
            error!(
                "[{}] Failed to ack delivery {}: {:#}",
                request_id, delivery.delivery_tag, e
            );
        }

        reply
    }

    /// Build the reply for a message body
    pub async fn handle(&self, body: &[u8], request_id: &str) -> Reply {
        let image_base64 = match InboundMessage::parse(body) {
            Ok(InboundMessage::HealthCheck) => {
                info!("[{}] Health check request received", request_id);
                return Reply::health();
            }
            Ok(InboundMessage::Extract { image_base64 }) => image_base64,
            Err(e) => {
                error!("[{}] {}", request_id, e);
                return Reply::invalid_photo();
            }
        };

        info!(
            "[{}] Received ID photo request (~{:.1} KB)",
            request_id,
            image_base64.len() as f64 * 3.0 / 4.0 / 1024.0
        );

        let bytes = match decode_base64_payload(&image_base64) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("[{}] Failed to decode image: {}", request_id, e);
                return Reply::invalid_photo();
            }
        };
        debug!("[{}] Base64 decoded ({} bytes)", request_id, bytes.len());

        let models = match self.registry.models().await {
            Ok(models) => models,
            Err(e) => {
                error!("[{}] Models unavailable: {:#}", request_id, e);
                return Reply::invalid_photo();
            }
        };

        let pipeline = IdCardPipeline::new(models, self.pipeline_config.clone());
        let id = request_id.to_string();
        let result =
            match tokio::task::spawn_blocking(move || pipeline.process_bytes(&bytes, &id)).await {
                Ok(result) => result,
                Err(e) => {
                    error!("[{}] Extraction task failed: {}", request_id, e);
                    return Reply::invalid_photo();
                }
            };

        let reply = Reply::from(result);
        if reply.is_error() {
            warn!("[{}] Processing failed", request_id);
        } else {
            info!("[{}] ✓ Completed", request_id);
        }
        reply
    }
}
