//! Bastion - timed moderation state for a community bot.
//!
//! Keeps active mutes and running giveaways in bounded in-memory maps and
//! fires their expiry effects when the stored end time passes.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `cache` - Bounded FIFO maps with per-key expiry timers
//! - `database` - MongoDB integration
//! - `expiry` - Mute and giveaway expiry effects
//! - `utils` - Utility functions

pub mod cache;
pub mod config;
pub mod database;
pub mod expiry;
pub mod utils;
