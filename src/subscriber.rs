// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Subscriber
//!
//! This module wires a queue to a handler. `subscribe` declares and binds the
//! queue on its own channel, starts a manual-acknowledgment consumer and runs
//! the consume loop in a background task, returning as soon as setup
//! succeeded.
//!
//! Only setup failures are returned to the caller. Inside the loop every
//! failure is logged and the loop moves on to the next delivery. The loop ends
//! when the delivery stream ends, which happens when the channel or the
//! connection is closed, and then closes its channel.

use crate::{
    codec::{BincodeCodec, Codec, JsonCodec},
    consumer::{consume, AckType},
    errors::AmqpError,
    queue::QueueDurability,
    topology::declare_and_bind,
    transport::{AmqpChannel, AmqpConnection, DeliveryStream},
};
use futures_util::StreamExt;
use opentelemetry::global;
use serde::de::DeserializeOwned;
use std::{any::Any, sync::Arc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A running subscription.
///
/// Dropping it leaves the consume loop running. The loop lives as long as its
/// channel.
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Name of the queue being consumed.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Whether the consume loop has stopped, normally or not.
    pub fn is_closed(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits until the delivery stream ended and the loop released its channel.
    ///
    /// # Returns
    /// `ConsumeLoopError` with the panic message when a handler panicked and
    /// took the loop down with it
    pub async fn closed(self) -> Result<(), AmqpError> {
        let Err(err) = self.handle.await else {
            return Ok(());
        };

        let reason = if err.is_panic() {
            panic_message(err.into_panic())
        } else {
            err.to_string()
        };

        error!(error = reason.as_str(), queue = self.queue.as_str(), "consume loop failed");
        Err(AmqpError::ConsumeLoopError(self.queue, reason))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_owned(),
            Err(_) => "handler panicked".to_owned(),
        },
    }
}

/// Subscribes `handler` to `queue_name`, decoding every message with `codec`.
///
/// The handler runs inside the subscription task, one message at a time, in
/// delivery order. A slow handler only delays its own subscription.
pub async fn subscribe<T, C, F>(
    conn: &dyn AmqpConnection,
    exchange: &str,
    queue_name: &str,
    key: &str,
    durability: QueueDurability,
    handler: F,
    codec: C,
) -> Result<Subscription, AmqpError>
where
    T: DeserializeOwned + Send + 'static,
    C: Codec,
    F: Fn(T) -> AckType + Send + Sync + 'static,
{
    let (channel, queue) = declare_and_bind(conn, exchange, queue_name, key, durability).await?;

    let deliveries = channel.consume(&queue.name).await?;

    debug!(queue = queue.name, exchange, key, "subscription started");

    let handle = tokio::spawn(consume_loop(
        channel,
        deliveries,
        queue.name.clone(),
        codec,
        handler,
    ));

    Ok(Subscription {
        queue: queue.name,
        handle,
    })
}

/// Subscribes a handler to JSON messages.
pub async fn subscribe_json<T, F>(
    conn: &dyn AmqpConnection,
    exchange: &str,
    queue_name: &str,
    key: &str,
    durability: QueueDurability,
    handler: F,
) -> Result<Subscription, AmqpError>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> AckType + Send + Sync + 'static,
{
    subscribe(conn, exchange, queue_name, key, durability, handler, JsonCodec).await
}

/// Subscribes a handler to messages encoded with the compact binary codec.
pub async fn subscribe_bincode<T, F>(
    conn: &dyn AmqpConnection,
    exchange: &str,
    queue_name: &str,
    key: &str,
    durability: QueueDurability,
    handler: F,
) -> Result<Subscription, AmqpError>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> AckType + Send + Sync + 'static,
{
    subscribe(conn, exchange, queue_name, key, durability, handler, BincodeCodec).await
}

async fn consume_loop<T, C, F>(
    channel: Arc<dyn AmqpChannel>,
    mut deliveries: DeliveryStream,
    queue: String,
    codec: C,
    handler: F,
) where
    T: DeserializeOwned + Send + 'static,
    C: Codec,
    F: Fn(T) -> AckType + Send + Sync + 'static,
{
    let tracer = global::tracer("amqp consumer");

    while let Some(result) = deliveries.next().await {
        match result {
            // Undecodable payloads come back as `Ok(None)` and were already
            // reported by `consume`.
            Ok(delivery) => {
                if let Err(err) = consume(&tracer, &delivery, &queue, &codec, &handler).await {
                    error!(error = err.to_string(), queue, "error consume msg");
                }
            }

            Err(err) => error!(error = err.to_string(), queue, "errors consume msg"),
        }
    }

    debug!(queue, "delivery stream ended, closing channel");

    if let Err(err) = channel.close().await {
        warn!(error = err.to_string(), queue, "failure to close the consumer channel");
    }
}
