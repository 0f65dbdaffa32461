// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Transport
//!
//! This module defines the seam between the pub/sub layer and the broker
//! client. The `AmqpConnection`, `AmqpChannel` and `DeliveryAcker` traits
//! expose only the operations the topology binder, the publisher and the
//! consume loop need, and are implemented here for `lapin`.
//!
//! Every channel returned by `AmqpConnection::open_channel` is private to the
//! caller that opened it. Acknowledgments are channel scoped, so a channel used
//! to consume should not be shared with unrelated publishers.

use crate::errors::AmqpError;
use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt};
use lapin::{
    acker::Acker,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::{FieldTable, ShortString},
    BasicProperties, Channel, Connection,
};
#[cfg(test)]
use mockall::automock;
use std::{fmt, sync::Arc};
use tracing::{debug, error};
use uuid::Uuid;

/// Stream of deliveries produced by a consumer.
///
/// The stream ends when the channel or the connection that owns it is closed.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, AmqpError>>;

/// Broker-side queue as confirmed by a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueHandle {
    pub name: String,
    /// Messages ready in the queue when it was declared
    pub message_count: u32,
    /// Consumers attached to the queue when it was declared
    pub consumer_count: u32,
}

impl QueueHandle {
    /// Creates a handle for an empty queue without consumers.
    ///
    /// # Parameters
    /// * `name` - Name the broker confirmed for the queue
    ///
    /// # Returns
    /// A handle with zero messages and zero consumers
    pub fn new(name: &str) -> QueueHandle {
        QueueHandle {
            name: name.to_owned(),
            message_count: 0,
            consumer_count: 0,
        }
    }
}

/// The wire unit handed to the broker: the content-type tag of the codec that
/// produced the payload and the payload itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    pub content_type: String,
    pub payload: Vec<u8>,
}

impl EncodedMessage {
    /// Creates a message ready to be published.
    ///
    /// # Parameters
    /// * `content_type` - Tag of the codec that produced `payload`
    /// * `payload` - The encoded bytes
    pub fn new(content_type: &str, payload: Vec<u8>) -> EncodedMessage {
        EncodedMessage {
            content_type: content_type.to_owned(),
            payload,
        }
    }
}

/// A connection able to open channels, safe to use from many tasks at once.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AmqpConnection: Send + Sync {
    /// Opens a fresh channel on this connection.
    async fn open_channel(&self) -> Result<Arc<dyn AmqpChannel>, AmqpError>;
}

/// The channel operations used by the pub/sub layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AmqpChannel: Send + Sync {
    /// Declares a queue, or confirms that an equivalent one already exists.
    ///
    /// # Parameters
    /// * `name` - Queue name
    /// * `options` - Durable, exclusive and auto-delete flags
    /// * `args` - Queue arguments, e.g. the dead-letter exchange
    ///
    /// # Returns
    /// The queue as confirmed by the broker, or `DeclareQueueError` when an
    /// existing queue was declared with other flags or arguments
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        args: FieldTable,
    ) -> Result<QueueHandle, AmqpError>;

    /// Binds `queue` to `exchange` under the routing `key`. Binding twice is a
    /// no-op on the broker.
    ///
    /// # Returns
    /// `BindingExchangeToQueueError` when the exchange or the queue is missing
    async fn bind_queue(&self, queue: &str, key: &str, exchange: &str) -> Result<(), AmqpError>;

    /// Hands a message to the broker without waiting for any confirmation.
    ///
    /// # Parameters
    /// * `exchange` - Exchange to publish to
    /// * `key` - Routing key
    /// * `message` - Payload and its content-type tag
    /// * `headers` - AMQP headers, carrying the trace context
    ///
    /// # Returns
    /// `PublishingError` when the broker client could not send the frame
    async fn publish(
        &self,
        exchange: &str,
        key: &str,
        message: EncodedMessage,
        headers: FieldTable,
    ) -> Result<(), AmqpError>;

    /// Starts a manual-acknowledgment consumer on `queue`.
    ///
    /// # Returns
    /// The stream of deliveries, or `ConsumerDeclarationError` when the
    /// consumer could not be registered
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, AmqpError>;

    /// Closes the channel. Deliveries that were not acknowledged on it are
    /// requeued by the broker and the consumer stream ends.
    ///
    /// # Returns
    /// `CloseChannelError` when the channel was already closed or the
    /// connection is gone
    async fn close(&self) -> Result<(), AmqpError>;
}

/// Terminal acknowledgment calls for a single delivery.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    /// Acknowledges the delivery, removing it from the queue.
    async fn ack(&self) -> Result<(), AmqpError>;

    /// Rejects the delivery.
    ///
    /// # Parameters
    /// * `requeue` - `true` puts it back in the queue, `false` drops it or
    ///   routes it to the queue's dead-letter exchange
    async fn nack(&self, requeue: bool) -> Result<(), AmqpError>;
}

/// A message received from a queue together with the means to acknowledge it.
#[derive(Clone)]
pub struct Delivery {
    pub delivery_tag: u64,
    /// Set when the broker delivered this message before
    pub redelivered: bool,
    /// Codec tag set by the publisher, informational only
    pub content_type: Option<String>,
    pub headers: FieldTable,
    pub data: Vec<u8>,
    acker: Arc<dyn DeliveryAcker>,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("content_type", &self.content_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

impl Delivery {
    /// Creates a first-time delivery with no tag, content type or headers.
    ///
    /// # Parameters
    /// * `data` - The encoded payload
    /// * `acker` - Settles this delivery on the channel that received it
    ///
    /// # Returns
    /// A delivery to refine with the `with_*` builders
    pub fn new(data: Vec<u8>, acker: Arc<dyn DeliveryAcker>) -> Delivery {
        Delivery {
            delivery_tag: 0,
            redelivered: false,
            content_type: None,
            headers: FieldTable::default(),
            data,
            acker,
        }
    }

    /// Sets the channel-scoped delivery tag.
    pub fn with_delivery_tag(mut self, tag: u64) -> Self {
        self.delivery_tag = tag;
        self
    }

    /// Marks the delivery as a redelivery.
    pub fn with_redelivered(mut self) -> Self {
        self.redelivered = true;
        self
    }

    /// Sets the content-type tag the publisher stamped on the message.
    ///
    /// # Parameters
    /// * `content_type` - e.g. `application/json`
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_owned());
        self
    }

    /// Replaces the AMQP headers, e.g. with an injected trace context.
    pub fn with_headers(mut self, headers: FieldTable) -> Self {
        self.headers = headers;
        self
    }

    /// Positive acknowledgment of this delivery only.
    ///
    /// # Returns
    /// `AckMessageError` when the channel is gone or the delivery was
    /// already settled
    pub async fn ack(&self) -> Result<(), AmqpError> {
        self.acker.ack().await
    }

    /// Negative acknowledgment of this delivery only.
    ///
    /// # Parameters
    /// * `requeue` - Whether the broker should redeliver the message
    ///
    /// # Returns
    /// `NackMessageError` when the channel is gone or the delivery was
    /// already settled
    pub async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        self.acker.nack(requeue).await
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(delivery: lapin::message::Delivery) -> Self {
        Delivery {
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            content_type: delivery
                .properties
                .content_type()
                .as_ref()
                .map(|value| value.to_string()),
            headers: delivery.properties.headers().clone().unwrap_or_default(),
            data: delivery.data,
            acker: Arc::new(LapinAcker(delivery.acker)),
        }
    }
}

struct LapinAcker(Acker);

#[async_trait]
impl DeliveryAcker for LapinAcker {
    async fn ack(&self) -> Result<(), AmqpError> {
        self.0
            .ack(BasicAckOptions { multiple: false })
            .await
            .map(|_| ())
            .map_err(|err| AmqpError::AckMessageError(err.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        self.0
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map(|_| ())
            .map_err(|err| AmqpError::NackMessageError(err.to_string()))
    }
}

#[async_trait]
impl AmqpConnection for Connection {
    async fn open_channel(&self) -> Result<Arc<dyn AmqpChannel>, AmqpError> {
        debug!("creating amqp channel...");
        match self.create_channel().await {
            Ok(c) => {
                debug!("channel created");
                Ok(Arc::new(c))
            }
            Err(err) => {
                error!(error = err.to_string(), "error to create the channel");
                Err(AmqpError::ChannelError(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl AmqpChannel for Channel {
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        args: FieldTable,
    ) -> Result<QueueHandle, AmqpError> {
        match self.queue_declare(name, options, args).await {
            Err(err) => {
                error!(error = err.to_string(), name, "error to declare the queue");
                Err(AmqpError::DeclareQueueError(name.to_owned(), err.to_string()))
            }
            Ok(queue) => Ok(QueueHandle {
                name: queue.name().to_string(),
                message_count: queue.message_count(),
                consumer_count: queue.consumer_count(),
            }),
        }
    }

    async fn bind_queue(&self, queue: &str, key: &str, exchange: &str) -> Result<(), AmqpError> {
        match self
            .queue_bind(
                queue,
                exchange,
                key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(AmqpError::BindingExchangeToQueueError(
                    exchange.to_owned(),
                    queue.to_owned(),
                    err.to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn publish(
        &self,
        exchange: &str,
        key: &str,
        message: EncodedMessage,
        headers: FieldTable,
    ) -> Result<(), AmqpError> {
        // The returned publisher confirm is dropped: delivery is fire-and-forget.
        match self
            .basic_publish(
                exchange,
                key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &message.payload,
                BasicProperties::default()
                    .with_content_type(ShortString::from(message.content_type))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(headers),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishingError(err.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, AmqpError> {
        let consumer = match self
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::ConsumerDeclarationError(
                    queue.to_owned(),
                    err.to_string(),
                ))
            }
            Ok(c) => Ok(c),
        }?;

        Ok(consumer
            .map(|result| {
                result
                    .map(Delivery::from)
                    .map_err(|err| AmqpError::ConsumerError(err.to_string()))
            })
            .boxed())
    }

    async fn close(&self) -> Result<(), AmqpError> {
        Channel::close(self, 200, "OK")
            .await
            .map_err(|err| AmqpError::CloseChannelError(err.to_string()))
    }
}
