//! MongoDB database wrapper.

use mongodb::bson::{Document, doc};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::info;

/// Collection holding mute records.
pub const MUTES_COLLECTION: &str = "mutes";
/// Collection holding giveaway records.
pub const GIVEAWAYS_COLLECTION: &str = "giveaways";
/// Collection the chat-facing process drains for pending actions.
pub const ACTIONS_COLLECTION: &str = "pending_actions";

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Errors
    /// Returns error if the connection or the initial ping fails.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(db_name);

        Ok(Self { db })
    }

    /// Create the indexes the repositories query by.
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        self.index(MUTES_COLLECTION, doc! { "guild_id": 1, "user_id": 1, "active": 1 }, false)
            .await?;
        self.index(MUTES_COLLECTION, doc! { "active": 1 }, false).await?;
        self.index(GIVEAWAYS_COLLECTION, doc! { "message_id": 1 }, true)
            .await?;
        self.index(GIVEAWAYS_COLLECTION, doc! { "ended": 1 }, false).await?;
        self.index(ACTIONS_COLLECTION, doc! { "delivered": 1, "created_at": 1 }, false)
            .await?;

        info!("Database indexes ensured");
        Ok(())
    }

    async fn index(&self, collection: &str, keys: Document, unique: bool) -> anyhow::Result<()> {
        let model = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(unique).build())
            .build();
        self.db
            .collection::<Document>(collection)
            .create_index(model)
            .await?;
        Ok(())
    }

    /// Get a typed collection from the database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}
