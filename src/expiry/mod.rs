//! Expiry module - what happens when a mute or giveaway runs out.
//!
//! ## Architecture
//!
//! - `gateway` - outbound seams to the chat platform
//! - `mute` - lifts a mute when its end time passes
//! - `giveaway` - draws and announces winners when a giveaway closes
//! - `state` - the `mutes` and `giveaways` maps, with startup rehydration

mod gateway;
mod giveaway;
mod mute;
mod state;

pub use gateway::{GiveawayGateway, ModerationGateway};
pub use giveaway::{GiveawayExpiry, draw_winners};
pub use mute::MuteExpiry;
pub use state::{GIVEAWAYS_CACHE, MUTES_CACHE, RehydrateReport, TimedState};
