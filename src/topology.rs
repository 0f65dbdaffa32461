// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topology Binder
//!
//! This module ensures that a subscription queue exists, carries the
//! dead-letter policy and is bound to its exchange. Declaring the same queue
//! and binding twice is idempotent on the broker side.
//!
//! The main components are:
//! - `AmqpTopology`: installs a queue definition and its binding on a channel
//! - `declare_and_bind`: opens a dedicated channel and installs one queue with
//!   one binding on it
//!
//! Transport failures are returned unchanged to the caller. No retry is
//! attempted here.

use crate::{
    errors::AmqpError,
    queue::{QueueBinding, QueueDefinition, QueueDurability},
    transport::{AmqpChannel, AmqpConnection, QueueHandle},
};
use std::sync::Arc;
use tracing::debug;

/// Installs one queue and its binding to an exchange on a channel.
pub struct AmqpTopology<'tp> {
    channel: Arc<dyn AmqpChannel>,
    queue: &'tp QueueDefinition,
    binding: &'tp QueueBinding<'tp>,
}

impl<'tp> AmqpTopology<'tp> {
    pub fn new(
        channel: Arc<dyn AmqpChannel>,
        queue: &'tp QueueDefinition,
        binding: &'tp QueueBinding<'tp>,
    ) -> AmqpTopology<'tp> {
        AmqpTopology {
            channel,
            queue,
            binding,
        }
    }

    /// Declares the queue, then sets up the binding. The binding is skipped
    /// when the declaration fails.
    ///
    /// # Returns
    /// The declared queue
    pub async fn install(&self) -> Result<QueueHandle, AmqpError> {
        let queue = self.install_queue().await?;
        self.binding_queue().await?;

        Ok(queue)
    }

    async fn install_queue(&self) -> Result<QueueHandle, AmqpError> {
        debug!("creating queue: {}", self.queue.name);

        let handle = self
            .channel
            .declare_queue(
                &self.queue.name,
                self.queue.declare_options(),
                self.queue.declare_args(),
            )
            .await?;

        debug!("queue: {} was created", handle.name);

        Ok(handle)
    }

    async fn binding_queue(&self) -> Result<(), AmqpError> {
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            self.binding.queue_name, self.binding.exchange_name, self.binding.routing_key
        );

        self.channel
            .bind_queue(
                self.binding.queue_name,
                self.binding.routing_key,
                self.binding.exchange_name,
            )
            .await?;

        debug!("queue was bounded");

        Ok(())
    }
}

/// Opens a fresh channel and makes sure `queue_name` exists with the flags of
/// `durability`, carries the dead-letter exchange and is bound to `exchange`
/// under `key`.
///
/// The returned channel belongs to the caller. When it is going to be used to
/// consume, it should not also be used for unrelated publishes.
///
/// # Example
/// ```ignore
/// let (channel, queue) = declare_and_bind(
///     conn.as_ref(),
///     "peril_topic",
///     "game_logs",
///     "game_logs.*",
///     QueueDurability::Durable,
/// )
/// .await?;
/// ```
pub async fn declare_and_bind(
    conn: &dyn AmqpConnection,
    exchange: &str,
    queue_name: &str,
    key: &str,
    durability: QueueDurability,
) -> Result<(Arc<dyn AmqpChannel>, QueueHandle), AmqpError> {
    let channel = conn.open_channel().await?;

    let queue_def = QueueDefinition::new(queue_name).durability(durability);
    let binding = QueueBinding::new(queue_name)
        .exchange(exchange)
        .routing_key(key);

    let queue = AmqpTopology::new(channel.clone(), &queue_def, &binding)
        .install()
        .await?;

    Ok((channel, queue))
}
