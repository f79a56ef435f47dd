//! Timed moderation state shared by command handlers.
//!
//! Wraps the `mutes` and `giveaways` maps with the stores behind them, and
//! rebuilds both maps from storage on startup.

use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info};

use super::{GiveawayExpiry, GiveawayGateway, ModerationGateway, MuteExpiry};
use crate::cache::{BoundedMap, CacheError, CacheRegistry, ExpiryHandler, Timed};
use crate::database::{Giveaway, GiveawayStore, Mute, MuteKey, MuteStore};

/// Registry name of the mute map.
pub const MUTES_CACHE: &str = "mutes";
/// Registry name of the giveaway map.
pub const GIVEAWAYS_CACHE: &str = "giveaways";

/// Counts from one [`TimedState::rehydrate`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehydrateReport {
    /// Mutes loaded back into the cache (timed or permanent).
    pub mutes_loaded: usize,
    /// Mutes whose end time passed while the process was down.
    pub mutes_expired: usize,
    pub giveaways_loaded: usize,
    pub giveaways_expired: usize,
    /// Overdue records whose expiry effect failed.
    pub failures: usize,
}

impl fmt::Display for RehydrateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mutes loaded, {} expired; {} giveaways loaded, {} expired; {} failures",
            self.mutes_loaded,
            self.mutes_expired,
            self.giveaways_loaded,
            self.giveaways_expired,
            self.failures
        )
    }
}

/// Mutes and giveaways tracked in memory with their expiry timers.
#[derive(Clone)]
pub struct TimedState {
    mutes: BoundedMap<MuteKey, Mute>,
    giveaways: BoundedMap<u64, Giveaway>,
    mute_store: Arc<dyn MuteStore>,
    giveaway_store: Arc<dyn GiveawayStore>,
    mute_expiry: MuteExpiry,
    giveaway_expiry: GiveawayExpiry,
}

impl TimedState {
    /// Register the `mutes` and `giveaways` maps and wire their effects.
    pub fn new(
        registry: &CacheRegistry,
        mute_store: Arc<dyn MuteStore>,
        giveaway_store: Arc<dyn GiveawayStore>,
        moderation: Arc<dyn ModerationGateway>,
        announcer: Arc<dyn GiveawayGateway>,
    ) -> Result<Self, CacheError> {
        let mute_expiry = MuteExpiry::new(moderation, Arc::clone(&mute_store));
        let giveaway_expiry = GiveawayExpiry::new(announcer, Arc::clone(&giveaway_store));

        let mutes = registry
            .get_or_create::<MuteKey, Mute>(MUTES_CACHE, Arc::new(mute_expiry.clone()))?;
        let giveaways = registry
            .get_or_create::<u64, Giveaway>(GIVEAWAYS_CACHE, Arc::new(giveaway_expiry.clone()))?;

        Ok(Self {
            mutes,
            giveaways,
            mute_store,
            giveaway_store,
            mute_expiry,
            giveaway_expiry,
        })
    }

    /// Track a mute that was just written to storage.
    pub fn track_mute(&self, mute: Mute) {
        self.mutes.set(mute.key(), mute);
    }

    /// Forget a mute lifted early. Its pending timer is cancelled when the
    /// cache is configured to cancel on delete.
    pub fn release_mute(&self, key: MuteKey) -> Option<Mute> {
        self.mutes.delete(&key)
    }

    /// Get a mute, falling back to storage on a cache miss.
    ///
    /// A cached mute past its end time counts as a miss: its expiry has run
    /// (or is running), so only storage knows whether it was lifted.
    pub async fn mute(&self, key: MuteKey) -> Result<Option<Mute>> {
        if let Some(mute) = self.mutes.get(&key)
            && !mute.is_overdue(Utc::now())
        {
            return Ok(Some(mute));
        }

        let mute = self.mute_store.get_mute(key).await?;
        refresh(&self.mutes, key, mute.clone());
        Ok(mute)
    }

    /// Track a giveaway that was just written to storage.
    pub fn track_giveaway(&self, giveaway: Giveaway) {
        self.giveaways.set(giveaway.message_id, giveaway);
    }

    /// Drop a concluded giveaway from the cache.
    pub fn forget_giveaway(&self, message_id: u64) -> Option<Giveaway> {
        self.giveaways.delete(&message_id)
    }

    /// Get a giveaway, falling back to storage on a cache miss.
    ///
    /// A cached giveaway past its end time counts as a miss, like [`mute`](Self::mute).
    pub async fn giveaway(&self, message_id: u64) -> Result<Option<Giveaway>> {
        if let Some(giveaway) = self.giveaways.get(&message_id)
            && !giveaway.is_overdue(Utc::now())
        {
            return Ok(Some(giveaway));
        }

        let giveaway = self.giveaway_store.get_giveaway(message_id).await?;
        refresh(&self.giveaways, message_id, giveaway.clone());
        Ok(giveaway)
    }

    pub fn mutes(&self) -> &BoundedMap<MuteKey, Mute> {
        &self.mutes
    }

    pub fn giveaways(&self) -> &BoundedMap<u64, Giveaway> {
        &self.giveaways
    }

    /// Reload unexpired state from storage and re-arm its timers.
    ///
    /// A cold cache has no timers, so nothing expires until this runs.
    /// Records that came due while the process was down are expired
    /// right away through the same effects.
    pub async fn rehydrate(&self) -> Result<RehydrateReport> {
        let mut report = RehydrateReport::default();
        let now = Utc::now();

        for mute in self.mute_store.active_mutes().await? {
            let key = mute.key();
            if mute.is_overdue(now) {
                report.mutes_expired += 1;
                if let Err(e) = self.mute_expiry.on_expire(key, mute).await {
                    error!("Failed to expire overdue mute {}: {:#}", key, e);
                    report.failures += 1;
                }
            } else {
                debug!("Restoring mute {}", key);
                self.mutes.set(key, mute);
                report.mutes_loaded += 1;
            }
        }

        for giveaway in self.giveaway_store.running_giveaways().await? {
            let message_id = giveaway.message_id;
            if giveaway.is_overdue(now) {
                report.giveaways_expired += 1;
                if let Err(e) = self.giveaway_expiry.on_expire(message_id, giveaway).await {
                    error!("Failed to end overdue giveaway {}: {:#}", message_id, e);
                    report.failures += 1;
                }
            } else {
                debug!("Restoring giveaway {}", message_id);
                self.giveaways.set(message_id, giveaway);
                report.giveaways_loaded += 1;
            }
        }

        info!("Rehydrated timed state: {}", report);
        Ok(report)
    }
}

/// Replace the cached copy of `key` with what storage returned.
///
/// Keys with an armed timer keep their snapshot until the effect has run,
/// so a refresh never cancels or replaces a pending expiry.
fn refresh<K, V>(map: &BoundedMap<K, V>, key: K, fresh: Option<V>)
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Timed + Clone + Send + Sync + 'static,
{
    if map.is_armed(&key) {
        return;
    }
    match fresh {
        Some(value) => map.set(key, value),
        None => {
            map.delete(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use anyhow::anyhow;
    use chrono::DateTime;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use tokio::time::sleep;

    use super::*;
    use crate::cache::CacheConfig;

    #[derive(Default)]
    struct MemoryMutes {
        mutes: Mutex<HashMap<MuteKey, Mute>>,
    }

    impl MemoryMutes {
        fn with(mutes: Vec<Mute>) -> Arc<Self> {
            let store = Self::default();
            for mute in mutes {
                store.mutes.lock().insert(mute.key(), mute);
            }
            Arc::new(store)
        }

        fn is_active(&self, key: MuteKey) -> bool {
            self.mutes.lock().get(&key).is_some_and(|m| m.active)
        }
    }

    impl MuteStore for MemoryMutes {
        fn active_mutes(&self) -> BoxFuture<'_, Result<Vec<Mute>>> {
            let mutes: Vec<Mute> = self.mutes.lock().values().filter(|m| m.active).cloned().collect();
            Box::pin(async move { Ok(mutes) })
        }

        fn get_mute(&self, key: MuteKey) -> BoxFuture<'_, Result<Option<Mute>>> {
            let mute = self.mutes.lock().get(&key).filter(|m| m.active).cloned();
            Box::pin(async move { Ok(mute) })
        }

        fn deactivate(&self, key: MuteKey) -> BoxFuture<'_, Result<bool>> {
            let changed = match self.mutes.lock().get_mut(&key) {
                Some(m) if m.active => {
                    m.active = false;
                    true
                }
                _ => false,
            };
            Box::pin(async move { Ok(changed) })
        }
    }

    #[derive(Default)]
    struct MemoryGiveaways {
        giveaways: Mutex<HashMap<u64, Giveaway>>,
    }

    impl MemoryGiveaways {
        fn with(giveaways: Vec<Giveaway>) -> Arc<Self> {
            let store = Self::default();
            for giveaway in giveaways {
                store.giveaways.lock().insert(giveaway.message_id, giveaway);
            }
            Arc::new(store)
        }

        fn stored(&self, message_id: u64) -> Option<Giveaway> {
            self.giveaways.lock().get(&message_id).cloned()
        }
    }

    impl GiveawayStore for MemoryGiveaways {
        fn running_giveaways(&self) -> BoxFuture<'_, Result<Vec<Giveaway>>> {
            let running: Vec<Giveaway> =
                self.giveaways.lock().values().filter(|g| !g.ended).cloned().collect();
            Box::pin(async move { Ok(running) })
        }

        fn get_giveaway(&self, message_id: u64) -> BoxFuture<'_, Result<Option<Giveaway>>> {
            let giveaway = self.stored(message_id);
            Box::pin(async move { Ok(giveaway) })
        }

        fn finish(&self, message_id: u64, winners: Vec<u64>) -> BoxFuture<'_, Result<bool>> {
            let changed = match self.giveaways.lock().get_mut(&message_id) {
                Some(g) if !g.ended => {
                    g.ended = true;
                    g.winners = winners;
                    true
                }
                _ => false,
            };
            Box::pin(async move { Ok(changed) })
        }
    }

    /// Records every gateway call; can be told to fail role removal.
    #[derive(Default)]
    struct FakeGateway {
        unmuted: Mutex<Vec<MuteKey>>,
        announced: Mutex<Vec<(u64, Vec<u64>)>>,
        fail_unmute: bool,
    }

    impl ModerationGateway for FakeGateway {
        fn remove_mute_role<'a>(&'a self, mute: &'a Mute) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                if self.fail_unmute {
                    return Err(anyhow!("missing permissions"));
                }
                self.unmuted.lock().push(mute.key());
                Ok(())
            })
        }
    }

    impl GiveawayGateway for FakeGateway {
        fn announce_winners<'a>(
            &'a self,
            giveaway: &'a Giveaway,
            winners: &'a [u64],
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.announced
                    .lock()
                    .push((giveaway.message_id, winners.to_vec()));
                Ok(())
            })
        }
    }

    struct Harness {
        state: TimedState,
        registry: CacheRegistry,
        mutes: Arc<MemoryMutes>,
        giveaways: Arc<MemoryGiveaways>,
        gateway: Arc<FakeGateway>,
    }

    fn harness(mutes: Vec<Mute>, giveaways: Vec<Giveaway>, gateway: FakeGateway) -> Harness {
        let registry = CacheRegistry::new(CacheConfig::new(16, 60).unwrap());
        let mutes = MemoryMutes::with(mutes);
        let giveaways = MemoryGiveaways::with(giveaways);
        let gateway = Arc::new(gateway);

        let state = TimedState::new(
            &registry,
            mutes.clone(),
            giveaways.clone(),
            gateway.clone(),
            gateway.clone(),
        )
        .unwrap();

        Harness {
            state,
            registry,
            mutes,
            giveaways,
            gateway,
        }
    }

    fn in_ms(ms: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::milliseconds(ms)
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracked_mute_is_lifted_once() {
        let mute = Mute::new(1, 10, 99, 5).until(in_ms(50));
        let h = harness(vec![mute.clone()], vec![], FakeGateway::default());

        h.state.track_mute(mute.clone());
        h.state.track_mute(mute.clone());
        assert_eq!(h.state.mutes().armed_count(), 1);

        sleep(Duration::from_millis(60)).await;

        assert_eq!(*h.gateway.unmuted.lock(), vec![MuteKey::new(1, 10)]);
        assert!(!h.mutes.is_active(MuteKey::new(1, 10)));
        assert!(!h.state.mutes().has_timeouts());
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_mute_never_fires() {
        let mute = Mute::new(1, 10, 99, 5).until(in_ms(50));
        let h = harness(vec![mute.clone()], vec![], FakeGateway::default());

        h.state.track_mute(mute);
        assert!(h.state.release_mute(MuteKey::new(1, 10)).is_some());

        sleep(Duration::from_millis(100)).await;
        assert!(h.gateway.unmuted.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_unmute_keeps_record_and_clears_timer() {
        let mute = Mute::new(1, 10, 99, 5).until(in_ms(20));
        let gateway = FakeGateway {
            fail_unmute: true,
            ..Default::default()
        };
        let h = harness(vec![mute.clone()], vec![], gateway);

        h.state.track_mute(mute);
        sleep(Duration::from_millis(40)).await;

        assert!(!h.state.mutes().has_timeouts());
        assert!(h.state.mutes().contains(&MuteKey::new(1, 10)));
        assert!(h.mutes.is_active(MuteKey::new(1, 10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_giveaway_draws_from_latest_entrants() {
        let mut stored = Giveaway::new(500, 20, 1, 7, "Nitro", in_ms(30)).with_winner_count(2);
        let snapshot = stored.clone();
        for user in [11, 12, 13] {
            stored.enter(user);
        }
        let h = harness(vec![], vec![stored], FakeGateway::default());

        h.state.track_giveaway(snapshot);
        sleep(Duration::from_millis(40)).await;

        let announced = h.gateway.announced.lock().clone();
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].0, 500);
        assert_eq!(announced[0].1.len(), 2);

        let ended = h.giveaways.stored(500).unwrap();
        assert!(ended.ended);
        assert_eq!(ended.winners, announced[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_giveaway_already_ended_is_skipped() {
        let mut stored = Giveaway::new(501, 20, 1, 7, "Role", in_ms(30));
        stored.ended = true;
        let mut snapshot = stored.clone();
        snapshot.ended = false;
        let h = harness(vec![], vec![stored], FakeGateway::default());

        h.state.track_giveaway(snapshot);
        sleep(Duration::from_millis(40)).await;

        assert!(h.gateway.announced.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rehydrate_arms_future_and_expires_overdue() {
        let pending = Mute::new(1, 10, 99, 5).until(in_ms(50));
        let overdue = Mute::new(1, 11, 99, 5).until(in_ms(-1_000));
        let permanent = Mute::new(1, 12, 99, 5);
        let running = Giveaway::new(600, 20, 1, 7, "Key", in_ms(50));
        let late = Giveaway::new(601, 20, 1, 7, "Badge", in_ms(-1_000));

        let h = harness(
            vec![pending, overdue, permanent],
            vec![running, late],
            FakeGateway::default(),
        );

        let report = h.state.rehydrate().await.unwrap();
        assert_eq!(
            report,
            RehydrateReport {
                mutes_loaded: 2,
                mutes_expired: 1,
                giveaways_loaded: 1,
                giveaways_expired: 1,
                failures: 0,
            }
        );

        assert_eq!(*h.gateway.unmuted.lock(), vec![MuteKey::new(1, 11)]);
        assert!(h.giveaways.stored(601).unwrap().ended);
        assert_eq!(h.state.mutes().armed_count(), 1);
        assert_eq!(h.state.giveaways().armed_count(), 1);

        sleep(Duration::from_millis(60)).await;

        assert_eq!(h.gateway.unmuted.lock().len(), 2);
        assert!(h.giveaways.stored(600).unwrap().ended);
        assert!(!h.registry.has_timeouts());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_then_lookup_refetches_from_store() {
        let permanent = Mute::new(1, 12, 99, 5);
        let h = harness(vec![permanent.clone()], vec![], FakeGateway::default());

        h.state.track_mute(permanent);
        let report = h.registry.sweep();
        assert!(report.cleared.contains(&MUTES_CACHE.to_string()));
        assert!(h.state.mutes().is_empty());

        let found = h.state.mute(MuteKey::new(1, 12)).await.unwrap();
        assert!(found.is_some());
        assert!(h.state.mutes().contains(&MuteKey::new(1, 12)));
        assert!(h.state.mute(MuteKey::new(9, 9)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_after_expiry_reads_storage() {
        let mute = Mute::new(1, 10, 99, 5).until(in_ms(20));
        let giveaway = Giveaway::new(800, 20, 1, 7, "Sticker", in_ms(20));
        let h = harness(vec![mute.clone()], vec![giveaway.clone()], FakeGateway::default());

        h.state.track_mute(mute);
        h.state.track_giveaway(giveaway);
        sleep(Duration::from_millis(40)).await;

        // The lifted mute is gone from storage and from the cache.
        assert!(h.state.mute(MuteKey::new(1, 10)).await.unwrap().is_none());
        assert!(!h.state.mutes().contains(&MuteKey::new(1, 10)));

        let ended = h.state.giveaway(800).await.unwrap().unwrap();
        assert!(ended.ended);
        assert!(h.state.giveaways().get(&800).unwrap().ended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_before_expiry_uses_cache() {
        let mute = Mute::new(1, 10, 99, 5).until(in_ms(60_000));
        let h = harness(vec![], vec![], FakeGateway::default());

        // Not in storage: a hit can only come from the cache.
        h.state.track_mute(mute.clone());
        assert_eq!(h.state.mute(MuteKey::new(1, 10)).await.unwrap(), Some(mute));
        assert!(h.state.mutes().is_armed(&MuteKey::new(1, 10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_giveaway() {
        let giveaway = Giveaway::new(700, 20, 1, 7, "Shirt", in_ms(30));
        let h = harness(vec![], vec![giveaway.clone()], FakeGateway::default());

        h.state.track_giveaway(giveaway);
        assert!(h.state.giveaway(700).await.unwrap().is_some());
        assert!(h.state.forget_giveaway(700).is_some());

        sleep(Duration::from_millis(40)).await;
        assert!(h.gateway.announced.lock().is_empty());
    }
}
