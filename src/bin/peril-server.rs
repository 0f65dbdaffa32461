// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Peril game server.
//!
//! Collects the shared game log and broadcasts pause/resume commands typed on
//! stdin to every connected client.

use anyhow::Result;
use clap::Parser;
use pubsub::{
    channel::new_amqp_connection,
    configs::Configs,
    logging::init_logging,
    publisher::publish_json,
    queue::QueueDurability,
    routing::{
        topic_key, GameLog, PlayingState, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC,
        GAME_LOG_SLUG, PAUSE_KEY,
    },
    subscriber::subscribe_bincode,
    transport::{AmqpChannel, AmqpConnection},
    AckType,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "peril-server", version, about = "Peril game server")]
struct Cli {
    /// Path to a TOML configs file
    #[arg(short, long)]
    config: Option<PathBuf>,
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
    info!("Peril game server connected to RabbitMQ!");

    let channel = conn.open_channel().await?;

    let logs = subscribe_bincode(
        conn.as_ref(),
        EXCHANGE_PERIL_TOPIC,
        GAME_LOG_SLUG,
        &topic_key(GAME_LOG_SLUG, "*"),
        QueueDurability::Durable,
        handle_log,
    )
    .await?;
    info!(queue = logs.queue(), "queue declared and bound");

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(cmd) = line.split_whitespace().next() else {
            continue;
        };

        match cmd {
            "pause" => send_state(channel.as_ref(), true).await,
            "resume" => send_state(channel.as_ref(), false).await,
            "help" => print_help(),
            "quit" => {
                info!("exiting...");
                break;
            }
            other => println!("unknown command: {other}"),
        }
    }

    if let Err(err) = conn.close(200, "server shutdown").await {
        error!(error = err.to_string(), "failure to close the connection");
    }

    Ok(())
}

fn handle_log(log: GameLog) -> AckType {
    info!(username = log.username, time = log.current_time, "{}", log.message);
    AckType::Ack
}

async fn send_state(channel: &dyn AmqpChannel, is_paused: bool) {
    let state = PlayingState { is_paused };

    match publish_json(channel, EXCHANGE_PERIL_DIRECT, PAUSE_KEY, &state).await {
        Ok(_) if is_paused => println!("Pause message sent!"),
        Ok(_) => println!("Resume message sent!"),
        Err(err) => error!(error = err.to_string(), "could not publish playing state"),
    }
}

fn print_help() {
    println!("Possible commands:");
    println!("* pause");
    println!("* resume");
    println!("* quit");
    println!("* help");
}
