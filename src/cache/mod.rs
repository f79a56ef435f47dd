//! Cache module - bounded maps with self-expiring entries.
//!
//! Tracks time-boxed moderation state (mutes, giveaways) in memory and
//! fires an expiry effect when an entry's deadline passes.
//!
//! ## Architecture
//!
//! - `BoundedMap` - fixed-capacity map with FIFO eviction that arms a timer
//!   for every value carrying a future deadline
//! - `ExpiryScheduler` - at most one pending timer per key, self-removing
//!   once its effect has run
//! - `CacheRegistry` - named maps sharing one config, plus a periodic sweep
//!   that clears maps with no armed timers
//!
//! ## Usage
//!
//! ```ignore
//! let registry = CacheRegistry::new(config);
//! let mutes = registry.get_or_create("mutes", Arc::new(mute_expiry))?;
//!
//! // Arms a timer if the mute ends in the future
//! mutes.set(key, mute);
//! ```

mod bounded;
mod config;
mod error;
mod registry;
mod scheduler;
mod timed;

pub use bounded::BoundedMap;
pub use config::{CacheConfig, RearmPolicy};
pub use error::CacheError;
pub use registry::{CacheRegistry, SweepHandle, SweepReport};
pub use scheduler::{ExpiryScheduler, TimerHandle};
pub use timed::{ExpiryHandler, NoExpiry, Timed};
