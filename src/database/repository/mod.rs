//! Repository exports.

mod giveaway_repository;
mod mute_repository;
mod outbox_repository;

pub use giveaway_repository::GiveawayRepository;
pub use mute_repository::MuteRepository;
pub use outbox_repository::OutboxRepository;
