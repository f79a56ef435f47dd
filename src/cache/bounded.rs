//! Bounded FIFO map that arms expiry timers on insertion.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::scheduler::ExpiryScheduler;
use super::{CacheConfig, ExpiryHandler, RearmPolicy, Timed};

/// Entries plus their insertion order.
struct Entries<K, V> {
    values: HashMap<K, V>,
    order: VecDeque<K>,
}

struct Inner<K, V> {
    name: Arc<str>,
    capacity: NonZeroUsize,
    rearm_policy: RearmPolicy,
    cancel_on_delete: bool,
    entries: Mutex<Entries<K, V>>,
    scheduler: ExpiryScheduler<K>,
    handler: Arc<dyn ExpiryHandler<K, V>>,
}

/// A fixed-capacity map with FIFO eviction and per-key expiry timers.
///
/// - Evicts the earliest-inserted key when a new key arrives at capacity.
/// - Overwriting an existing key keeps its position and never evicts.
/// - Values whose [`Timed::deadline`] lies in the future get one timer per
///   key, which runs the map's [`ExpiryHandler`] when it fires.
/// - Firing does not remove the value; eviction does not cancel the timer.
///
/// Cloning is cheap and shares the same underlying map.
pub struct BoundedMap<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Timed + Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<K, V>>,
}

// Manual Clone implementation that doesn't require K: Clone, V: Clone
impl<K, V> Clone for BoundedMap<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Timed + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> BoundedMap<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Timed + Clone + Send + Sync + 'static,
{
    /// Create a new map with the given name, config and expiry handler.
    pub fn new(
        name: impl Into<Arc<str>>,
        config: &CacheConfig,
        handler: Arc<dyn ExpiryHandler<K, V>>,
    ) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(Inner {
                scheduler: ExpiryScheduler::new(Arc::clone(&name)),
                name,
                capacity: config.max_size,
                rearm_policy: config.rearm_policy,
                cancel_on_delete: config.cancel_on_delete,
                entries: Mutex::new(Entries {
                    values: HashMap::new(),
                    order: VecDeque::new(),
                }),
                handler,
            }),
        }
    }

    /// Get the name of this map.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.capacity.get()
    }

    /// Insert or overwrite a value, arming its expiry timer if needed.
    ///
    /// Must be called from within a Tokio runtime for timers to be armed.
    pub fn set(&self, key: K, value: V) {
        let mut entries = self.inner.entries.lock();

        if let Some(slot) = entries.values.get_mut(&key) {
            *slot = value.clone();
        } else {
            if entries.values.len() >= self.inner.capacity.get()
                && let Some(oldest) = entries.order.pop_front()
            {
                entries.values.remove(&oldest);
                debug!("Evicted {:?} from '{}'", oldest, self.inner.name);
            }
            entries.order.push_back(key.clone());
            entries.values.insert(key.clone(), value.clone());
        }

        // Arming under the entries lock keeps `clear_if_idle` atomic.
        self.schedule(key, value);
    }

    fn schedule(&self, key: K, value: V) {
        if self.inner.rearm_policy == RearmPolicy::ResetOnUpdate
            && self.inner.scheduler.cancel(&key)
        {
            debug!("Reset timer for {:?} in '{}'", key, self.inner.name);
        }

        let Some(delay) = value.deadline().and_then(|d| delay_until(d, Utc::now())) else {
            return;
        };

        let handler = Arc::clone(&self.inner.handler);
        let effect_key = key.clone();
        self.inner
            .scheduler
            .arm(key, delay, move || handler.on_expire(effect_key, value));
    }

    /// Get a value from the map.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.entries.lock().values.get(key).cloned()
    }

    /// Check if a key exists in the map.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.entries.lock().values.contains_key(key)
    }

    /// Remove a key, cancelling its pending timer when configured to.
    pub fn delete(&self, key: &K) -> Option<V> {
        let mut entries = self.inner.entries.lock();
        let removed = entries.values.remove(key);
        if removed.is_some() {
            entries.order.retain(|k| k != key);
        }

        // Under the entries lock so a concurrent `set` cannot slip a new
        // timer in before the cancel.
        if self.inner.cancel_on_delete {
            self.inner.scheduler.cancel(key);
        }

        removed
    }

    /// True if one or more timers are armed (or firing).
    pub fn has_timeouts(&self) -> bool {
        self.inner.scheduler.has_timeouts()
    }

    /// Number of armed (or firing) timers.
    pub fn armed_count(&self) -> usize {
        self.inner.scheduler.armed_count()
    }

    /// Check if `key` has an armed (or firing) timer.
    pub fn is_armed(&self, key: &K) -> bool {
        self.inner.scheduler.is_armed(key)
    }

    /// Clear the map only if no timer is armed.
    ///
    /// Returns the number of entries dropped, or `None` if a timer was armed
    /// and the map was left untouched.
    pub fn clear_if_idle(&self) -> Option<usize> {
        let mut entries = self.inner.entries.lock();
        if self.inner.scheduler.has_timeouts() {
            return None;
        }
        let dropped = entries.values.len();
        entries.values.clear();
        entries.order.clear();
        Some(dropped)
    }

    /// Get the number of entries in the map.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().values.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().values.is_empty()
    }

    /// Keys in insertion order, oldest first.
    pub fn keys(&self) -> Vec<K> {
        self.inner.entries.lock().order.iter().cloned().collect()
    }
}

/// Time left until `deadline`, or `None` if it is not strictly in the future.
fn delay_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (deadline - now).to_std().ok().filter(|delay| !delay.is_zero())
}

impl<K, V> std::fmt::Debug for BoundedMap<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Timed + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedMap")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .field("armed", &self.armed_count())
            .finish()
    }
}
