// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Queue-style gateway: message parsing, the prefetch-1 consumer and a
//! newline-delimited JSON transport

pub mod consumer;
pub mod message;
pub mod stdio;

pub use consumer::{ConsumerStats, Delivery, OcrConsumer, ReplyChannel};
pub use message::{
    ExtractionReply, InboundMessage, MessageError, Reply, HEALTH_PATTERN, HEALTH_STATUS,
    INVALID_PHOTO_REPLY,
};
pub use stdio::{line_deliveries, parse_delivery_line, LineReplyChannel};
