// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Peril game client.
//!
//! Follows the server's pause/resume broadcasts on a private queue and
//! announces the player in the shared game log.

use anyhow::Result;
use clap::Parser;
use pubsub::{
    channel::new_amqp_connection,
    configs::Configs,
    logging::init_logging,
    publisher::publish_bincode,
    queue::QueueDurability,
    routing::{
        pause_queue, topic_key, GameLog, PlayingState, EXCHANGE_PERIL_DIRECT,
        EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, PAUSE_KEY,
    },
    subscriber::subscribe_json,
    transport::AmqpConnection,
    AckType,
};
use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "peril-client", version, about = "Peril game client")]
struct Cli {
    /// Path to a TOML configs file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Player name, also used to name the private pause queue
    #[arg(short, long)]
    username: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let cfg = match cli.config {
        Some(path) => Configs::from_file(path)?,
        None => Configs::default(),
    };

    let conn = new_amqp_connection(&cfg).await?;
    info!("Peril client connected to RabbitMQ!");

    let pause = subscribe_json(
        conn.as_ref(),
        EXCHANGE_PERIL_DIRECT,
        &pause_queue(&cli.username),
        PAUSE_KEY,
        QueueDurability::Transient,
        handle_pause,
    )
    .await?;
    info!(queue = pause.queue(), "queue declared and bound");

    let channel = conn.open_channel().await?;
    let joined = GameLog {
        current_time: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        message: format!("{} joined the game", cli.username),
        username: cli.username.clone(),
    };
    publish_bincode(
        channel.as_ref(),
        EXCHANGE_PERIL_TOPIC,
        &topic_key(GAME_LOG_SLUG, &cli.username),
        &joined,
    )
    .await?;

    tokio::signal::ctrl_c().await?;

    if let Err(err) = conn.close(200, "client shutdown").await {
        error!(error = err.to_string(), "failure to close the connection");
    }
    info!("RabbitMQ connection closed.");

    Ok(())
}

fn handle_pause(state: PlayingState) -> AckType {
    if state.is_paused {
        info!("game paused");
    } else {
        info!("game resumed");
    }

    AckType::Ack
}
