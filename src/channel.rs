// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection Management
//!
//! This module establishes the connection to the RabbitMQ server. The
//! connection is shared: publishers and every subscription open their own
//! channels on it through `AmqpConnection::open_channel`.

use crate::{configs::Configs, errors::AmqpError};
use lapin::{types::LongString, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Connects to the RabbitMQ server described by `cfg`.
///
/// The connection is named after `cfg.app.name` so it can be told apart in
/// the management UI.
///
/// # Example
/// ```ignore
/// let conn = new_amqp_connection(&Configs::default()).await?;
/// let channel = conn.open_channel().await?;
/// ```
pub async fn new_amqp_connection(cfg: &Configs) -> Result<Arc<Connection>, AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app.name.clone()));

    match Connection::connect(&cfg.amqp_uri(), options).await {
        Ok(conn) => {
            debug!("amqp connected");
            Ok(Arc::new(conn))
        }
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError(err.to_string()))
        }
    }
}
