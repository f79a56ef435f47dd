//! Chat-platform seams used by expiry effects.

use anyhow::Result;
use futures::future::BoxFuture;

use crate::database::{Giveaway, Mute};

/// Moderation actions on the chat platform.
pub trait ModerationGateway: Send + Sync {
    /// Take the mute role away from the muted member.
    fn remove_mute_role<'a>(&'a self, mute: &'a Mute) -> BoxFuture<'a, Result<()>>;
}

/// Giveaway announcements on the chat platform.
pub trait GiveawayGateway: Send + Sync {
    /// Announce the drawn winners (possibly none) in the giveaway's channel.
    fn announce_winners<'a>(
        &'a self,
        giveaway: &'a Giveaway,
        winners: &'a [u64],
    ) -> BoxFuture<'a, Result<()>>;
}
