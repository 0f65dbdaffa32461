// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Log output for the Peril binaries.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Registry,
};

/// Installs the global subscriber. The filter comes from `RUST_LOG` and
/// defaults to `info`.
pub fn init_logging() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let formatting_layer = fmt::layer().with_target(true).compact();

    Registry::default()
        .with(filter)
        .with(formatting_layer)
        .try_init()
}
