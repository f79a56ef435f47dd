//! Cache registry - Central management for all bounded maps.

use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::{BoundedMap, CacheConfig, CacheError, ExpiryHandler, Timed};

/// Type-erased view of a map used by the sweep.
trait SweepTarget: Send + Sync {
    fn has_timeouts(&self) -> bool;
    fn clear_if_idle(&self) -> Option<usize>;
}

impl<K, V> SweepTarget for BoundedMap<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Timed + Clone + Send + Sync + 'static,
{
    fn has_timeouts(&self) -> bool {
        BoundedMap::has_timeouts(self)
    }

    fn clear_if_idle(&self) -> Option<usize> {
        BoundedMap::clear_if_idle(self)
    }
}

/// Internal cache entry storing a type-erased map.
struct CacheEntry {
    cache: Box<dyn Any + Send + Sync>,
    sweep: Arc<dyn SweepTarget>,
    type_id: TypeId,
    type_name: &'static str,
}

impl CacheEntry {
    fn new<K, V>(map: &BoundedMap<K, V>) -> Self
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Timed + Clone + Send + Sync + 'static,
    {
        Self {
            cache: Box::new(map.clone()),
            sweep: Arc::new(map.clone()),
            type_id: TypeId::of::<BoundedMap<K, V>>(),
            type_name: std::any::type_name::<BoundedMap<K, V>>(),
        }
    }

    fn downcast<K, V>(&self, name: &str) -> Result<BoundedMap<K, V>, CacheError>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Timed + Clone + Send + Sync + 'static,
    {
        if self.type_id != TypeId::of::<BoundedMap<K, V>>() {
            return Err(CacheError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<BoundedMap<K, V>>(),
                found: self.type_name,
            });
        }

        self.cache
            .downcast_ref::<BoundedMap<K, V>>()
            .cloned()
            .ok_or_else(|| CacheError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<BoundedMap<K, V>>(),
                found: self.type_name,
            })
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Maps that had no armed timers and were cleared.
    pub cleared: Vec<String>,
    /// Maps left untouched because a timer was armed.
    pub skipped: Vec<String>,
    /// Entries dropped across all cleared maps.
    pub entries_dropped: usize,
}

/// Central registry owning every named [`BoundedMap`].
///
/// All maps share one [`CacheConfig`]: the same capacity, policies and
/// sweep interval, fixed when the registry is built. The periodic sweep
/// clears maps that have no armed timers; their entries can be re-fetched
/// from durable storage on demand.
///
/// ## Example
///
/// ```ignore
/// let registry = CacheRegistry::new(config);
/// let mutes = registry.create("mutes", Arc::new(mute_expiry))?;
/// mutes.set(key, mute);
/// let sweeper = registry.spawn_sweeper();
/// ```
#[derive(Clone)]
pub struct CacheRegistry {
    config: Arc<CacheConfig>,
    caches: Arc<DashMap<String, CacheEntry>>,
}

impl CacheRegistry {
    /// Create a new empty cache registry.
    pub fn new(config: CacheConfig) -> Self {
        info!(
            "Cache registry initialized (capacity {}, sweep every {}s, {})",
            config.max_size,
            config.sweep_interval.as_secs(),
            config.rearm_policy.as_str()
        );
        Self {
            config: Arc::new(config),
            caches: Arc::new(DashMap::new()),
        }
    }

    /// The configuration shared by every map.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Create a new map and register it.
    pub fn create<K, V>(
        &self,
        name: &str,
        handler: Arc<dyn ExpiryHandler<K, V>>,
    ) -> Result<BoundedMap<K, V>, CacheError>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Timed + Clone + Send + Sync + 'static,
    {
        match self.caches.entry(name.to_string()) {
            Entry::Occupied(_) => Err(CacheError::AlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                let map = BoundedMap::new(name, &self.config, handler);
                slot.insert(CacheEntry::new(&map));
                debug!("Creating cache: {}", name);
                Ok(map)
            }
        }
    }

    /// Get an existing map by name.
    ///
    /// Returns `Ok(None)` if the map doesn't exist and an error if it exists
    /// with different key/value types.
    pub fn get<K, V>(&self, name: &str) -> Result<Option<BoundedMap<K, V>>, CacheError>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Timed + Clone + Send + Sync + 'static,
    {
        self.caches
            .get(name)
            .map(|entry| entry.downcast(name))
            .transpose()
    }

    /// Get an existing map or create a new one if it doesn't exist.
    ///
    /// `handler` is only used when the map is created.
    pub fn get_or_create<K, V>(
        &self,
        name: &str,
        handler: Arc<dyn ExpiryHandler<K, V>>,
    ) -> Result<BoundedMap<K, V>, CacheError>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Timed + Clone + Send + Sync + 'static,
    {
        match self.caches.entry(name.to_string()) {
            Entry::Occupied(slot) => slot.get().downcast(name),
            Entry::Vacant(slot) => {
                let map = BoundedMap::new(name, &self.config, handler);
                slot.insert(CacheEntry::new(&map));
                debug!("Creating cache: {}", name);
                Ok(map)
            }
        }
    }

    /// Check if a map with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Get the number of registered maps.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Get a sorted list of all registered map names.
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Clear every map that has no armed timers.
    pub fn sweep(&self) -> SweepReport {
        // Collect first so no shard lock is held while maps are locked.
        let targets: Vec<(String, Arc<dyn SweepTarget>)> = self
            .caches
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(&e.value().sweep)))
            .collect();

        let mut report = SweepReport::default();
        for (name, target) in targets {
            match target.clear_if_idle() {
                Some(dropped) => {
                    report.entries_dropped += dropped;
                    report.cleared.push(name);
                }
                None => report.skipped.push(name),
            }
        }

        report.cleared.sort();
        report.skipped.sort();
        debug!(
            "Cache sweep: cleared {:?} ({} entries), skipped busy {:?}",
            report.cleared, report.entries_dropped, report.skipped
        );
        report
    }

    /// Check if any registered map has an armed timer.
    pub fn has_timeouts(&self) -> bool {
        self.caches.iter().any(|e| e.value().sweep.has_timeouts())
    }

    /// Run [`sweep`](Self::sweep) every `sweep_interval` until stopped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_sweeper(&self) -> SweepHandle {
        let registry = self.clone();
        let period = self.config.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                registry.sweep();
            }
        });

        info!("Cache sweeper started (every {}s)", period.as_secs());
        SweepHandle { task }
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("cache_count", &self.caches.len())
            .field("cache_names", &self.cache_names())
            .finish()
    }
}

/// Handle to the periodic sweep task.
///
/// Dropping the handle leaves the sweeper running.
#[derive(Debug)]
pub struct SweepHandle {
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Stop the sweeper.
    pub fn stop(self) {
        self.task.abort();
        info!("Cache sweeper stopped");
    }

    /// True once the sweeper task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
