// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Pub/Sub Layer
//!
//! This module provides the error type shared by every pub/sub operation.
//! The `AmqpError` enum covers connection, channel, queue and binding setup,
//! payload encoding and decoding, and the acknowledgment calls issued by the
//! consume loop.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Variants that wrap a transport or codec failure carry the underlying
/// message so the caller sees the broker's own reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmqpError {
    /// Error loading or parsing the configuration
    #[error("failure to load configs `{0}`")]
    ConfigsError(String),

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect `{0}`")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel `{0}`")]
    ChannelError(String),

    /// Error closing a channel
    #[error("failure to close the channel `{0}`")]
    CloseChannelError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{1}` to exchange `{0}`: {2}")]
    BindingExchangeToQueueError(String, String, String),

    /// Error starting a consumer on a queue
    #[error("failure to declare consumer on `{0}`: {1}")]
    ConsumerDeclarationError(String, String),

    /// Error receiving a delivery from the consumer stream
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// Error publishing a message
    #[error("failure to publish `{0}`")]
    PublishingError(String),

    /// Error serializing a payload
    #[error("failure to encode payload `{0}`")]
    EncodePayloadError(String),

    /// Error deserializing a payload
    #[error("failure to decode payload `{0}`")]
    DecodePayloadError(String),

    /// Error acknowledging a message
    #[error("failure to ack message `{0}`")]
    AckMessageError(String),

    /// Error negative-acknowledging a message
    #[error("failure to nack message `{0}`")]
    NackMessageError(String),

    /// The consume loop of a queue stopped abnormally, e.g. a handler panicked
    #[error("consume loop of `{0}` failed: {1}")]
    ConsumeLoopError(String, String),
}
