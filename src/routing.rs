// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Game Routing
//!
//! Exchange names, routing keys and payloads exchanged by the Peril server and
//! clients. Field names are PascalCase on the wire to stay compatible with
//! peers written against the same JSON documents.

use serde::{Deserialize, Serialize};

pub const EXCHANGE_PERIL_DIRECT: &str = "peril_direct";
pub const EXCHANGE_PERIL_TOPIC: &str = "peril_topic";

pub const PAUSE_KEY: &str = "pause";
pub const GAME_LOG_SLUG: &str = "game_logs";

/// Whether the game is paused. Published by the server on every pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayingState {
    pub is_paused: bool,
}

/// A line of the shared game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameLog {
    /// Unix timestamp in seconds.
    pub current_time: u64,
    pub message: String,
    pub username: String,
}

/// Routing key of a topic-scoped message, e.g. `game_logs.alice`.
pub fn topic_key(prefix: &str, suffix: &str) -> String {
    format!("{prefix}.{suffix}")
}

/// Queue name of a player's private pause queue.
pub fn pause_queue(username: &str) -> String {
    topic_key(PAUSE_KEY, username)
}
