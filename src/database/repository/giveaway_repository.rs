//! Giveaway repository.

use anyhow::Result;
use futures::TryStreamExt;
use futures::future::BoxFuture;
use mongodb::Collection;
use mongodb::bson::doc;
use tracing::debug;

use crate::database::models::Giveaway;
use crate::database::mongo::GIVEAWAYS_COLLECTION;
use crate::database::{Database, GiveawayStore};

/// Repository for giveaways, keyed by hosting message ID.
pub struct GiveawayRepository {
    collection: Collection<Giveaway>,
}

impl GiveawayRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(GIVEAWAYS_COLLECTION),
        }
    }

    pub async fn find(&self, message_id: u64) -> Result<Option<Giveaway>> {
        let filter = doc! { "message_id": message_id as i64 };
        Ok(self.collection.find_one(filter).await?)
    }

    /// Get all giveaways that have not ended.
    pub async fn find_running(&self) -> Result<Vec<Giveaway>> {
        let cursor = self.collection.find(doc! { "ended": false }).await?;
        let giveaways: Vec<Giveaway> = cursor.try_collect().await?;
        debug!("Loaded {} running giveaways", giveaways.len());
        Ok(giveaways)
    }

    /// End a running giveaway and record its winners.
    pub async fn finish(&self, message_id: u64, winners: Vec<u64>) -> Result<bool> {
        let winners: Vec<i64> = winners.into_iter().map(|w| w as i64).collect();
        let filter = doc! { "message_id": message_id as i64, "ended": false };
        let update = doc! { "$set": { "ended": true, "winners": winners } };

        let result = self.collection.update_one(filter, update).await?;
        debug!("Finished giveaway {}: {}", message_id, result.modified_count > 0);
        Ok(result.modified_count > 0)
    }
}

impl GiveawayStore for GiveawayRepository {
    fn running_giveaways(&self) -> BoxFuture<'_, Result<Vec<Giveaway>>> {
        Box::pin(self.find_running())
    }

    fn get_giveaway(&self, message_id: u64) -> BoxFuture<'_, Result<Option<Giveaway>>> {
        Box::pin(self.find(message_id))
    }

    fn finish(&self, message_id: u64, winners: Vec<u64>) -> BoxFuture<'_, Result<bool>> {
        Box::pin(GiveawayRepository::finish(self, message_id, winners))
    }
}
