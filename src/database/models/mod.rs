//! Database models.

pub mod action;
pub mod giveaway;
pub mod mute;

pub use action::{ActionKind, PendingAction};
pub use giveaway::Giveaway;
pub use mute::{Mute, MuteKey};
