// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Publisher
//!
//! This module encodes typed payloads with a codec and hands them to a channel
//! for fire-and-forget delivery. A successful return means the transport
//! accepted the message, not that any consumer received it. The current
//! OpenTelemetry context is propagated in the message headers.
//!
//! There is no retry and no buffering. Sequential publishes on one channel
//! keep their order.

use crate::{
    codec::{BincodeCodec, Codec, JsonCodec},
    errors::AmqpError,
    otel,
    transport::{AmqpChannel, EncodedMessage},
};
use opentelemetry::Context;
use serde::Serialize;
use tracing::{debug, error};

/// Encodes `value` with `codec` and publishes it to `exchange` under `key`.
///
/// Nothing is sent when encoding fails.
pub async fn publish<T, C>(
    channel: &dyn AmqpChannel,
    exchange: &str,
    key: &str,
    value: &T,
    codec: &C,
) -> Result<(), AmqpError>
where
    T: Serialize,
    C: Codec,
{
    let payload = match codec.encode(value) {
        Err(err) => {
            error!(error = err.to_string(), exchange, key, "error encoding message");
            Err(err)
        }
        Ok(p) => Ok(p),
    }?;

    let headers = otel::inject_context(&Context::current());

    channel
        .publish(
            exchange,
            key,
            EncodedMessage::new(codec.content_type(), payload),
            headers,
        )
        .await?;

    debug!(exchange, key, content_type = codec.content_type(), "message published");

    Ok(())
}

/// Publishes `value` as JSON.
pub async fn publish_json<T: Serialize>(
    channel: &dyn AmqpChannel,
    exchange: &str,
    key: &str,
    value: &T,
) -> Result<(), AmqpError> {
    publish(channel, exchange, key, value, &JsonCodec).await
}

/// Publishes `value` with the compact binary codec.
pub async fn publish_bincode<T: Serialize>(
    channel: &dyn AmqpChannel,
    exchange: &str,
    key: &str,
    value: &T,
) -> Result<(), AmqpError> {
    publish(channel, exchange, key, value, &BincodeCodec).await
}
