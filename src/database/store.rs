//! Storage seams used by the expiry layer.
//!
//! The MongoDB repositories implement these; tests use in-memory fakes.

use anyhow::Result;
use futures::future::BoxFuture;

use super::models::{Giveaway, Mute, MuteKey};

/// Durable source of truth for mutes.
pub trait MuteStore: Send + Sync {
    /// All mutes that have not been lifted.
    fn active_mutes(&self) -> BoxFuture<'_, Result<Vec<Mute>>>;

    /// The active mute for a member, if any.
    fn get_mute(&self, key: MuteKey) -> BoxFuture<'_, Result<Option<Mute>>>;

    /// Mark the member's active mute as lifted. Returns false if none was active.
    fn deactivate(&self, key: MuteKey) -> BoxFuture<'_, Result<bool>>;
}

/// Durable source of truth for giveaways.
pub trait GiveawayStore: Send + Sync {
    /// All giveaways that have not ended.
    fn running_giveaways(&self) -> BoxFuture<'_, Result<Vec<Giveaway>>>;

    fn get_giveaway(&self, message_id: u64) -> BoxFuture<'_, Result<Option<Giveaway>>>;

    /// End a running giveaway with the drawn winners.
    /// Returns false if it had already ended.
    fn finish(&self, message_id: u64, winners: Vec<u64>) -> BoxFuture<'_, Result<bool>>;
}
