//! Mute repository.
//!
//! Source of truth for mutes; the in-memory cache is rebuilt from here.

use anyhow::Result;
use futures::TryStreamExt;
use futures::future::BoxFuture;
use mongodb::Collection;
use mongodb::bson::doc;
use tracing::debug;

use crate::database::models::{Mute, MuteKey};
use crate::database::mongo::MUTES_COLLECTION;
use crate::database::{Database, MuteStore};

/// Repository for mute records.
pub struct MuteRepository {
    collection: Collection<Mute>,
}

impl MuteRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(MUTES_COLLECTION),
        }
    }

    /// Get all active mutes.
    pub async fn find_active(&self) -> Result<Vec<Mute>> {
        let cursor = self.collection.find(doc! { "active": true }).await?;
        let mutes: Vec<Mute> = cursor.try_collect().await?;
        debug!("Loaded {} active mutes", mutes.len());
        Ok(mutes)
    }

    /// Get the active mute for a member.
    pub async fn find(&self, key: MuteKey) -> Result<Option<Mute>> {
        let filter = doc! {
            "guild_id": key.guild_id as i64,
            "user_id": key.user_id as i64,
            "active": true
        };
        Ok(self.collection.find_one(filter).await?)
    }

    /// Mark the member's active mute as lifted.
    pub async fn deactivate(&self, key: MuteKey) -> Result<bool> {
        let filter = doc! {
            "guild_id": key.guild_id as i64,
            "user_id": key.user_id as i64,
            "active": true
        };
        let update = doc! { "$set": { "active": false } };

        let result = self.collection.update_many(filter, update).await?;
        debug!("Deactivated mute {}: {}", key, result.modified_count > 0);
        Ok(result.modified_count > 0)
    }
}

impl MuteStore for MuteRepository {
    fn active_mutes(&self) -> BoxFuture<'_, Result<Vec<Mute>>> {
        Box::pin(self.find_active())
    }

    fn get_mute(&self, key: MuteKey) -> BoxFuture<'_, Result<Option<Mute>>> {
        Box::pin(self.find(key))
    }

    fn deactivate(&self, key: MuteKey) -> BoxFuture<'_, Result<bool>> {
        Box::pin(MuteRepository::deactivate(self, key))
    }
}
