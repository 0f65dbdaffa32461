// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Configuration
//!
//! Connection settings for the broker and the application identity used to
//! name the AMQP connection. Every field has a default so an empty or partial
//! TOML file is valid.

use crate::errors::AmqpError;
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::error;

/// Application identity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfigs {
    pub name: String,
}

impl Default for AppConfigs {
    fn default() -> Self {
        AppConfigs {
            name: "peril".to_owned(),
        }
    }
}

/// Broker connection parameters.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RabbitMQConfigs {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

impl Default for RabbitMQConfigs {
    fn default() -> Self {
        RabbitMQConfigs {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Configs {
    pub app: AppConfigs,
    pub rabbitmq: RabbitMQConfigs,
}

impl Configs {
    /// Loads configs from a TOML file.
    ///
    /// # Example
    /// ```toml
    /// [app]
    /// name = "peril-server"
    ///
    /// [rabbitmq]
    /// host = "rabbit.local"
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Configs, AmqpError> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|err| {
            error!(error = err.to_string(), "failure to read configs file");
            AmqpError::ConfigsError(err.to_string())
        })?;

        Configs::from_toml(&raw)
    }

    /// Parses configs from a TOML document.
    pub fn from_toml(raw: &str) -> Result<Configs, AmqpError> {
        toml::from_str(raw).map_err(|err| {
            error!(error = err.to_string(), "failure to parse configs");
            AmqpError::ConfigsError(err.to_string())
        })
    }

    /// Renders the AMQP URI for the configured broker.
    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.rabbitmq.user,
            self.rabbitmq.password,
            self.rabbitmq.host,
            self.rabbitmq.port,
            self.rabbitmq.vhost
        )
    }
}
