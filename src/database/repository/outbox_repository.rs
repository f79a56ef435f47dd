//! Outbox repository.
//!
//! Expiry effects that need the chat platform are queued here and
//! delivered by the chat-facing process.

use anyhow::Result;
use futures::future::BoxFuture;
use mongodb::Collection;
use tracing::debug;

use crate::database::models::{ActionKind, Giveaway, Mute, PendingAction};
use crate::database::mongo::ACTIONS_COLLECTION;
use crate::database::Database;
use crate::expiry::{GiveawayGateway, ModerationGateway};

/// Repository for pending chat actions.
pub struct OutboxRepository {
    collection: Collection<PendingAction>,
}

impl OutboxRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(ACTIONS_COLLECTION),
        }
    }

    /// Queue an action for delivery.
    pub async fn enqueue(&self, action: ActionKind) -> Result<()> {
        let pending = PendingAction::new(action);
        self.collection.insert_one(&pending).await?;
        debug!("Queued action {:?}", pending.action);
        Ok(())
    }
}

impl ModerationGateway for OutboxRepository {
    fn remove_mute_role<'a>(&'a self, mute: &'a Mute) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.enqueue(ActionKind::RemoveMuteRole {
            guild_id: mute.guild_id,
            user_id: mute.user_id,
            role_id: mute.role_id,
        }))
    }
}

impl GiveawayGateway for OutboxRepository {
    fn announce_winners<'a>(
        &'a self,
        giveaway: &'a Giveaway,
        winners: &'a [u64],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.enqueue(ActionKind::AnnounceGiveaway {
            guild_id: giveaway.guild_id,
            channel_id: giveaway.channel_id,
            message_id: giveaway.message_id,
            prize: giveaway.prize.clone(),
            winners: winners.to_vec(),
        }))
    }
}
