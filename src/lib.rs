// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod consumer;
mod otel;
#[cfg(test)]
mod testing;

pub mod channel;
pub mod codec;
pub mod configs;
pub mod errors;
pub mod logging;
pub mod publisher;
pub mod queue;
pub mod routing;
pub mod subscriber;
pub mod topology;
pub mod transport;

pub use consumer::AckType;
