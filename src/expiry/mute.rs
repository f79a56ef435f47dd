//! Mute expiry: lift the mute once its end time passes.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tracing::info;

use super::ModerationGateway;
use crate::cache::{ExpiryHandler, Timed};
use crate::database::{Mute, MuteKey, MuteStore};

impl Timed for Mute {
    fn deadline(&self) -> Option<DateTime<Utc>> {
        if self.active { self.ends_at } else { None }
    }
}

/// Removes the mute role, then marks the mute lifted in storage.
#[derive(Clone)]
pub struct MuteExpiry {
    gateway: Arc<dyn ModerationGateway>,
    store: Arc<dyn MuteStore>,
}

impl MuteExpiry {
    pub fn new(gateway: Arc<dyn ModerationGateway>, store: Arc<dyn MuteStore>) -> Self {
        Self { gateway, store }
    }
}

impl ExpiryHandler<MuteKey, Mute> for MuteExpiry {
    fn on_expire(&self, key: MuteKey, mute: Mute) -> BoxFuture<'static, anyhow::Result<()>> {
        let gateway = Arc::clone(&self.gateway);
        let store = Arc::clone(&self.store);

        Box::pin(async move {
            gateway
                .remove_mute_role(&mute)
                .await
                .with_context(|| format!("failed to remove mute role for {}", key))?;
            store
                .deactivate(key)
                .await
                .with_context(|| format!("failed to mark mute {} as lifted", key))?;

            info!("Mute {} expired and was lifted", key);
            Ok(())
        })
    }
}
