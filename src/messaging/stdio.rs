// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Newline-delimited JSON transport
//!
//! Each input line is one delivery:
//! `{"correlation_id": "..", "reply_to": "..", "body": <json or string>}`.
//! Replies are written one per line as
//! `{"reply_to": "..", "correlation_id": "..", "body": <json>}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::consumer::{Delivery, ReplyChannel};

#[derive(Debug, Deserialize)]
struct DeliveryLine {
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default)]
    reply_to: Option<String>,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Serialize)]
struct ReplyLine<'a> {
    reply_to: &'a str,
    correlation_id: Option<&'a str>,
    body: Value,
}

/// Turn one input line into a delivery
///
/// A line that is not a delivery object is passed through as a body with no
/// reply address, so it is still consumed and acknowledged.
pub fn parse_delivery_line(line: &str, delivery_tag: u64) -> Delivery {
    match serde_json::from_str::<DeliveryLine>(line) {
        Ok(wire) => {
            let body = match wire.body {
                Value::String(s) => s.into_bytes(),
                other => other.to_string().into_bytes(),
            };
            Delivery {
                delivery_tag,
                body,
                correlation_id: wire.correlation_id,
                reply_to: wire.reply_to,
            }
        }
        Err(e) => {
            warn!("Line {} is not a delivery envelope: {}", delivery_tag, e);
            Delivery {
                delivery_tag,
                body: line.as_bytes().to_vec(),
                correlation_id: None,
                reply_to: None,
            }
        }
    }
}

/// Deliveries read lazily from a line-oriented reader
///
/// The next line is only read when the consumer asks for it.
pub fn line_deliveries<R>(reader: R) -> impl Stream<Item = Delivery>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold((reader.lines(), 0u64), |(mut lines, mut tag)| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    tag += 1;
                    let delivery = parse_delivery_line(&line, tag);
                    return Some((delivery, (lines, tag)));
                }
                Ok(None) => return None,
                Err(e) => {
                    error!("Failed to read delivery: {}", e);
                    return None;
                }
            }
        }
    })
}

/// Reply channel writing one JSON line per reply
pub struct LineReplyChannel<W> {
    writer: Mutex<W>,
}

impl<W> LineReplyChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> ReplyChannel for LineReplyChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(
        &self,
        reply_to: &str,
        correlation_id: Option<&str>,
        body: Vec<u8>,
    ) -> Result<()> {
        let body: Value = serde_json::from_slice(&body).context("Reply body is not JSON")?;
        let mut line = serde_json::to_vec(&ReplyLine {
            reply_to,
            correlation_id,
            body,
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        debug!("Acked delivery {}", delivery_tag);
        Ok(())
    }
}
