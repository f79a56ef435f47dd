//! Giveaway expiry: draw winners and announce them.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::GiveawayGateway;
use crate::cache::{ExpiryHandler, Timed};
use crate::database::{Giveaway, GiveawayStore};

impl Timed for Giveaway {
    fn deadline(&self) -> Option<DateTime<Utc>> {
        if self.ended { None } else { Some(self.ends_at) }
    }
}

/// Pick up to `count` distinct winners, uniformly at random.
pub fn draw_winners(entrants: &[u64], count: u32) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(entrants.len());
    let mut pool: Vec<u64> = entrants.iter().copied().filter(|id| seen.insert(*id)).collect();

    pool.shuffle(&mut rand::rng());
    pool.truncate(count as usize);
    pool
}

/// Ends a giveaway: re-reads it from storage, draws winners, persists
/// them and announces the result.
#[derive(Clone)]
pub struct GiveawayExpiry {
    gateway: Arc<dyn GiveawayGateway>,
    store: Arc<dyn GiveawayStore>,
}

impl GiveawayExpiry {
    pub fn new(gateway: Arc<dyn GiveawayGateway>, store: Arc<dyn GiveawayStore>) -> Self {
        Self { gateway, store }
    }
}

impl ExpiryHandler<u64, Giveaway> for GiveawayExpiry {
    fn on_expire(
        &self,
        message_id: u64,
        snapshot: Giveaway,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        let gateway = Arc::clone(&self.gateway);
        let store = Arc::clone(&self.store);

        Box::pin(async move {
            // Entrants keep arriving after the cache snapshot was taken.
            let giveaway = match store.get_giveaway(message_id).await? {
                Some(giveaway) => giveaway,
                None => {
                    warn!(
                        "Giveaway {} ({}) is gone from storage, skipping",
                        message_id, snapshot.prize
                    );
                    return Ok(());
                }
            };

            if giveaway.ended {
                debug!("Giveaway {} already ended", message_id);
                return Ok(());
            }

            let winners = draw_winners(&giveaway.entrants, giveaway.winner_count);
            if !store.finish(message_id, winners.clone()).await? {
                debug!("Giveaway {} was ended concurrently", message_id);
                return Ok(());
            }

            gateway
                .announce_winners(&giveaway, &winners)
                .await
                .with_context(|| format!("failed to announce giveaway {}", message_id))?;

            info!(
                "Giveaway {} ended: {} winner(s) from {} entrant(s)",
                message_id,
                winners.len(),
                giveaway.entrants.len()
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_is_distinct_and_bounded() {
        let entrants = vec![1, 2, 2, 3, 3, 3, 4];

        for _ in 0..50 {
            let winners = draw_winners(&entrants, 3);
            assert_eq!(winners.len(), 3);
            let unique: HashSet<u64> = winners.iter().copied().collect();
            assert_eq!(unique.len(), 3);
            assert!(winners.iter().all(|w| entrants.contains(w)));
        }
    }

    #[test]
    fn test_draw_with_few_entrants() {
        assert_eq!(draw_winners(&[7, 7], 5), vec![7]);
        assert!(draw_winners(&[], 1).is_empty());
        assert!(draw_winners(&[1, 2], 0).is_empty());
    }
}
