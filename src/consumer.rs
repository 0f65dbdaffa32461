// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Consumer
//!
//! This module processes one delivery at a time: it decodes the payload,
//! runs the caller's handler and turns the handler's verdict into exactly one
//! acknowledgment call.
//!
//! A payload that cannot be decoded is neither acked nor nacked. It stays
//! pending on the broker until the channel closes and it is redelivered, or
//! until a queue policy expires it into the dead-letter exchange.

use crate::{codec::Codec, errors::AmqpError, otel, transport::Delivery};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use tracing::{debug, error, warn};

/// Verdict a handler returns for one decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckType {
    /// Processed; remove the message from the queue.
    Ack,
    /// Failed transiently; the broker redelivers it, possibly to another consumer.
    NackRequeue,
    /// Failed permanently; the broker drops it or routes it to the dead-letter exchange.
    NackDiscard,
}

/// Consumes and processes a single delivery.
///
/// # Returns
/// The verdict that was applied, `None` when the payload could not be decoded
/// and was left unacknowledged, or the acknowledgment error
pub(crate) async fn consume<T, C, F>(
    tracer: &BoxedTracer,
    delivery: &Delivery,
    queue: &str,
    codec: &C,
    handler: &F,
) -> Result<Option<AckType>, AmqpError>
where
    T: DeserializeOwned,
    C: Codec,
    F: Fn(T) -> AckType,
{
    let (_ctx, mut span) = otel::new_span(&delivery.headers, tracer, queue);

    debug!(
        queue,
        delivery_tag = delivery.delivery_tag,
        redelivered = delivery.redelivered,
        "received message"
    );

    let msg: T = match codec.decode(&delivery.data) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(
                error = err.to_string(),
                queue,
                delivery_tag = delivery.delivery_tag,
                "leaving undecodable message unacknowledged"
            );
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("failure to decode payload"),
            });
            return Ok(None);
        }
    };

    let ack_type = handler(msg);

    let result = match ack_type {
        AckType::Ack => delivery.ack().await,
        AckType::NackRequeue => delivery.nack(true).await,
        AckType::NackDiscard => delivery.nack(false).await,
    };

    match result {
        Err(err) => {
            error!(error = err.to_string(), ?ack_type, "error whiling acknowledging msg");
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("error to acknowledge msg"),
            });
            Err(err)
        }
        _ => {
            debug!(?ack_type, "message acknowledged");
            span.set_status(Status::Ok);
            Ok(Some(ack_type))
        }
    }
}
