//! Giveaway records.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A giveaway stored in the `giveaways` collection.
///
/// Keyed by the ID of the message that hosts it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Giveaway {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub message_id: u64,
    pub channel_id: u64,
    pub guild_id: u64,
    pub host_id: u64,

    pub prize: String,

    /// Number of winners to draw (default: 1)
    #[serde(default = "default_winner_count")]
    pub winner_count: u32,

    /// User IDs that entered
    #[serde(default)]
    pub entrants: Vec<u64>,

    pub ends_at: DateTime<Utc>,

    #[serde(default)]
    pub ended: bool,

    /// Drawn winners, filled in when the giveaway ends
    #[serde(default)]
    pub winners: Vec<u64>,
}

fn default_winner_count() -> u32 {
    1
}

impl Giveaway {
    /// Create a running giveaway.
    pub fn new(
        message_id: u64,
        channel_id: u64,
        guild_id: u64,
        host_id: u64,
        prize: impl Into<String>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            message_id,
            channel_id,
            guild_id,
            host_id,
            prize: prize.into(),
            winner_count: default_winner_count(),
            entrants: Vec::new(),
            ends_at,
            ended: false,
            winners: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_winner_count(mut self, count: u32) -> Self {
        self.winner_count = count;
        self
    }

    /// Add an entrant. Returns false if they already entered.
    pub fn enter(&mut self, user_id: u64) -> bool {
        if self.entrants.contains(&user_id) {
            return false;
        }
        self.entrants.push(user_id);
        true
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.ended && self.ends_at <= now
    }
}
