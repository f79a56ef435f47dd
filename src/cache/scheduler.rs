//! Expiry scheduler - at most one delayed effect per key.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, error, warn};

use crate::utils::format_duration;

/// Bookkeeping for one armed key.
struct ArmedTimer {
    generation: u64,
    abort: AbortHandle,
    /// Set once the delay elapsed and the effect started running.
    firing: bool,
}

type ArmedTimers<K> = Arc<Mutex<HashMap<K, ArmedTimer>>>;

/// Schedules one-shot expiry effects keyed by `K`.
///
/// Arming is check-and-set under a single lock, so two arms for the same
/// key never produce two timers. A timer removes its own bookkeeping once
/// its effect has finished, whether the effect succeeded or not.
pub struct ExpiryScheduler<K> {
    name: Arc<str>,
    armed: ArmedTimers<K>,
    next_generation: AtomicU64,
}

impl<K> ExpiryScheduler<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    /// Create an empty scheduler. `name` is only used in logs.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            armed: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Arm `effect` to run after `delay`.
    ///
    /// Returns `None` without scheduling anything if `key` is already armed,
    /// or if called outside a Tokio runtime.
    pub fn arm<F, Fut>(&self, key: K, delay: Duration, effect: F) -> Option<TimerHandle<K>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                "Cannot arm timer for {:?} in '{}': no Tokio runtime",
                key, self.name
            );
            return None;
        };

        let mut armed = self.armed.lock();
        if armed.contains_key(&key) {
            debug!("Timer for {:?} in '{}' already armed", key, self.name);
            return None;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let task = runtime.spawn(run_timer(
            Arc::clone(&self.name),
            Arc::clone(&self.armed),
            key.clone(),
            generation,
            delay,
            effect,
        ));
        let abort = task.abort_handle();

        // The task cannot observe its own entry until this lock is released.
        armed.insert(
            key.clone(),
            ArmedTimer {
                generation,
                abort: abort.clone(),
                firing: false,
            },
        );

        debug!(
            "Armed timer for {:?} in '{}', fires in {}",
            key,
            self.name,
            format_duration(delay)
        );

        Some(TimerHandle {
            key,
            generation,
            abort,
            armed: Arc::clone(&self.armed),
        })
    }

    /// Cancel the pending timer for `key`.
    ///
    /// Returns `false` if nothing was armed or the effect is already running.
    pub fn cancel(&self, key: &K) -> bool {
        let timer = {
            let mut armed = self.armed.lock();
            match armed.get(key) {
                Some(timer) if !timer.firing => armed.remove(key),
                _ => None,
            }
        };

        match timer {
            Some(timer) => {
                timer.abort.abort();
                debug!("Cancelled timer for {:?} in '{}'", key, self.name);
                true
            }
            None => false,
        }
    }

    /// True if one or more timers are armed or firing.
    pub fn has_timeouts(&self) -> bool {
        !self.armed.lock().is_empty()
    }

    /// Number of armed (or firing) timers.
    pub fn armed_count(&self) -> usize {
        self.armed.lock().len()
    }

    /// Check if `key` has an armed (or firing) timer.
    pub fn is_armed(&self, key: &K) -> bool {
        self.armed.lock().contains_key(key)
    }
}

impl<K> std::fmt::Debug for ExpiryScheduler<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryScheduler")
            .field("name", &self.name)
            .field("armed", &self.armed.lock().len())
            .finish()
    }
}

/// Handle to one armed timer.
///
/// Dropping the handle does not cancel the timer.
pub struct TimerHandle<K>
where
    K: Eq + Hash,
{
    key: K,
    generation: u64,
    abort: AbortHandle,
    armed: ArmedTimers<K>,
}

impl<K> TimerHandle<K>
where
    K: Eq + Hash,
{
    /// The key this timer belongs to.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Cancel the timer if it has not fired yet.
    ///
    /// Returns `false` if the timer already fired, is firing, or was replaced.
    pub fn cancel(&self) -> bool {
        let timer = {
            let mut armed = self.armed.lock();
            match armed.get(&self.key) {
                Some(timer) if timer.generation == self.generation && !timer.firing => {
                    armed.remove(&self.key)
                }
                _ => None,
            }
        };

        match timer {
            Some(timer) => {
                timer.abort.abort();
                true
            }
            None => false,
        }
    }

    /// True once the timer task has completed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Removes the timer's bookkeeping when the task ends, however it ends.
struct Release<K>
where
    K: Eq + Hash,
{
    armed: ArmedTimers<K>,
    key: K,
    generation: u64,
}

impl<K> Drop for Release<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let mut armed = self.armed.lock();
        if armed
            .get(&self.key)
            .is_some_and(|timer| timer.generation == self.generation)
        {
            armed.remove(&self.key);
        }
    }
}

async fn run_timer<K, F, Fut>(
    name: Arc<str>,
    armed: ArmedTimers<K>,
    key: K,
    generation: u64,
    delay: Duration,
    effect: F,
) where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let _release = Release {
        armed: Arc::clone(&armed),
        key: key.clone(),
        generation,
    };

    tokio::time::sleep(delay).await;

    {
        let mut timers = armed.lock();
        match timers.get_mut(&key) {
            Some(timer) if timer.generation == generation => timer.firing = true,
            _ => return,
        }
    }

    debug!("Timer for {:?} in '{}' fired", key, name);

    // Failures are not retried; the bookkeeping is released either way.
    if let Err(e) = effect().await {
        error!("Expiry effect for {:?} in '{}' failed: {:#}", key, name, e);
    }
}
