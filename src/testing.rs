// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! In-memory broker for unit tests.
//!
//! Queues keep their declared flags and arguments, bindings use topic
//! matching, a requeued message goes back to its queue flagged as redelivered
//! and a discarded one is routed to the queue's dead-letter exchange. Every
//! acknowledgment call is recorded per queue.

use crate::{
    errors::AmqpError,
    queue::AMQP_HEADERS_DEAD_LETTER_EXCHANGE,
    transport::{
        AmqpChannel, AmqpConnection, Delivery, DeliveryAcker, DeliveryStream, EncodedMessage,
        QueueHandle,
    },
};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use lapin::{
    options::QueueDeclareOptions,
    types::{AMQPValue, FieldTable},
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckCall {
    Ack,
    Nack { requeue: bool },
}

#[derive(Debug, Clone)]
struct Message {
    key: String,
    content_type: String,
    headers: FieldTable,
    payload: Vec<u8>,
}

struct MemoryQueue {
    options: QueueDeclareOptions,
    args: FieldTable,
    bindings: Vec<(String, String)>,
    tx: UnboundedSender<Delivery>,
    rx: Option<UnboundedReceiver<Delivery>>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, MemoryQueue>,
    ack_calls: HashMap<String, Vec<AckCall>>,
    next_tag: u64,
    closed_channels: usize,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub(crate) fn new() -> MemoryBroker {
        MemoryBroker::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn queue_count(&self) -> usize {
        self.lock().queues.len()
    }

    /// `(exchange, routing key)` pairs bound to `queue`.
    pub(crate) fn bindings_of(&self, queue: &str) -> Vec<(String, String)> {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.bindings.clone())
            .unwrap_or_default()
    }

    pub(crate) fn ack_calls(&self, queue: &str) -> Vec<AckCall> {
        self.lock().ack_calls.get(queue).cloned().unwrap_or_default()
    }

    pub(crate) fn closed_channels(&self) -> usize {
        self.lock().closed_channels
    }

    /// Drops every queue, which ends every delivery stream once drained.
    pub(crate) fn shutdown(&self) {
        self.lock().queues.clear();
    }

    fn route(&self, exchange: &str, message: Message) {
        let targets: Vec<String> = self
            .lock()
            .queues
            .iter()
            .filter(|(_, q)| {
                q.bindings
                    .iter()
                    .any(|(ex, pattern)| ex == exchange && topic_matches(pattern, &message.key))
            })
            .map(|(name, _)| name.clone())
            .collect();

        for queue in targets {
            self.enqueue(&queue, message.clone(), false);
        }
    }

    fn enqueue(&self, queue: &str, message: Message, redelivered: bool) {
        let mut state = self.lock();
        state.next_tag += 1;
        let tag = state.next_tag;

        let Some(q) = state.queues.get(queue) else {
            return;
        };

        let acker = MemoryAcker {
            broker: self.clone(),
            queue: queue.to_owned(),
            message: message.clone(),
            settled: AtomicBool::new(false),
        };

        let mut delivery = Delivery::new(message.payload, Arc::new(acker))
            .with_delivery_tag(tag)
            .with_content_type(&message.content_type)
            .with_headers(message.headers);
        if redelivered {
            delivery = delivery.with_redelivered();
        }

        let _ = q.tx.send(delivery);
    }

    fn dead_letter(&self, queue: &str, message: Message) {
        let dlx = self.lock().queues.get(queue).and_then(|q| {
            match q.args.inner().get(AMQP_HEADERS_DEAD_LETTER_EXCHANGE) {
                Some(AMQPValue::LongString(name)) => {
                    Some(String::from_utf8_lossy(name.as_bytes()).into_owned())
                }
                _ => None,
            }
        });

        if let Some(exchange) = dlx {
            self.route(&exchange, message);
        }
    }

    fn record(&self, queue: &str, call: AckCall) {
        self.lock()
            .ack_calls
            .entry(queue.to_owned())
            .or_default()
            .push(call);
    }

    fn declare(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        args: FieldTable,
    ) -> Result<QueueHandle, AmqpError> {
        let mut state = self.lock();

        if let Some(existing) = state.queues.get(name) {
            let equivalent = existing.options.durable == options.durable
                && existing.options.exclusive == options.exclusive
                && existing.options.auto_delete == options.auto_delete
                && existing.args == args;
            if !equivalent {
                return Err(AmqpError::DeclareQueueError(
                    name.to_owned(),
                    "PRECONDITION_FAILED - inequivalent arg".to_owned(),
                ));
            }

            return Ok(QueueHandle {
                name: name.to_owned(),
                message_count: 0,
                consumer_count: u32::from(existing.rx.is_none()),
            });
        }

        let (tx, rx) = unbounded_channel();
        state.queues.insert(
            name.to_owned(),
            MemoryQueue {
                options,
                args,
                bindings: vec![],
                tx,
                rx: Some(rx),
            },
        );

        Ok(QueueHandle::new(name))
    }

    fn bind(&self, queue: &str, key: &str, exchange: &str) -> Result<(), AmqpError> {
        let mut state = self.lock();
        let Some(q) = state.queues.get_mut(queue) else {
            return Err(AmqpError::BindingExchangeToQueueError(
                exchange.to_owned(),
                queue.to_owned(),
                "NOT_FOUND - no queue".to_owned(),
            ));
        };

        let binding = (exchange.to_owned(), key.to_owned());
        if !q.bindings.contains(&binding) {
            q.bindings.push(binding);
        }

        Ok(())
    }

    fn take_receiver(&self, queue: &str) -> Result<UnboundedReceiver<Delivery>, AmqpError> {
        self.lock()
            .queues
            .get_mut(queue)
            .and_then(|q| q.rx.take())
            .ok_or_else(|| {
                AmqpError::ConsumerDeclarationError(
                    queue.to_owned(),
                    "RESOURCE_LOCKED - queue already consumed or missing".to_owned(),
                )
            })
    }
}

#[async_trait]
impl AmqpConnection for MemoryBroker {
    async fn open_channel(&self) -> Result<Arc<dyn AmqpChannel>, AmqpError> {
        Ok(Arc::new(MemoryChannel {
            broker: self.clone(),
        }))
    }
}

struct MemoryChannel {
    broker: MemoryBroker,
}

#[async_trait]
impl AmqpChannel for MemoryChannel {
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        args: FieldTable,
    ) -> Result<QueueHandle, AmqpError> {
        self.broker.declare(name, options, args)
    }

    async fn bind_queue(&self, queue: &str, key: &str, exchange: &str) -> Result<(), AmqpError> {
        self.broker.bind(queue, key, exchange)
    }

    async fn publish(
        &self,
        exchange: &str,
        key: &str,
        message: EncodedMessage,
        headers: FieldTable,
    ) -> Result<(), AmqpError> {
        self.broker.route(
            exchange,
            Message {
                key: key.to_owned(),
                content_type: message.content_type,
                headers,
                payload: message.payload,
            },
        );
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, AmqpError> {
        let rx = self.broker.take_receiver(queue)?;

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (Ok(delivery), rx))
        })
        .boxed())
    }

    async fn close(&self) -> Result<(), AmqpError> {
        self.broker.lock().closed_channels += 1;
        Ok(())
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    queue: String,
    message: Message,
    settled: AtomicBool,
}

impl MemoryAcker {
    fn settle(&self, call: AckCall) -> Result<(), AmqpError> {
        self.broker.record(&self.queue, call);

        if self.settled.swap(true, Ordering::SeqCst) {
            return Err(AmqpError::AckMessageError(
                "PRECONDITION_FAILED - unknown delivery tag".to_owned(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl DeliveryAcker for MemoryAcker {
    async fn ack(&self) -> Result<(), AmqpError> {
        self.settle(AckCall::Ack)
    }

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        self.settle(AckCall::Nack { requeue })?;

        if requeue {
            self.broker.enqueue(&self.queue, self.message.clone(), true);
        } else {
            self.broker.dead_letter(&self.queue, self.message.clone());
        }

        Ok(())
    }
}

/// Topic exchange matching: `*` is exactly one word, `#` zero or more.
fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();

    words_match(&pattern, &key)
}

fn words_match(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            words_match(rest, key) || (!key.is_empty() && words_match(pattern, &key[1..]))
        }
        (Some((&"*", rest)), Some((_, key_rest))) => words_match(rest, key_rest),
        (Some((word, rest)), Some((part, key_rest))) => word == part && words_match(rest, key_rest),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_patterns() {
        assert!(topic_matches("pause", "pause"));
        assert!(!topic_matches("pause", "pause.alice"));
        assert!(topic_matches("game_logs.*", "game_logs.alice"));
        assert!(!topic_matches("game_logs.*", "game_logs"));
        assert!(!topic_matches("game_logs.*", "game_logs.alice.extra"));
        assert!(topic_matches("#", "anything.at.all"));
        assert!(topic_matches("army_moves.#", "army_moves"));
        assert!(topic_matches("war.#.end", "war.a.b.end"));
    }

    #[tokio::test]
    async fn settling_twice_is_rejected() {
        let broker = MemoryBroker::new();
        let channel = broker.open_channel().await.unwrap();
        channel
            .declare_queue("q", QueueDeclareOptions::default(), FieldTable::default())
            .await
            .unwrap();
        channel.bind_queue("q", "k", "ex").await.unwrap();

        let mut deliveries = channel.consume("q").await.unwrap();
        channel
            .publish("ex", "k", EncodedMessage::new("text/plain", b"hi".to_vec()), FieldTable::default())
            .await
            .unwrap();

        let delivery = deliveries.next().await.unwrap().unwrap();
        assert_eq!(delivery.data, b"hi");
        assert!(delivery.ack().await.is_ok());
        assert!(delivery.ack().await.is_err());
        assert_eq!(broker.ack_calls("q"), vec![AckCall::Ack, AckCall::Ack]);
    }
}
