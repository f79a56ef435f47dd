//! Database module exports.

mod models;
mod mongo;
mod repository;
mod store;

pub use models::*;
pub use mongo::{ACTIONS_COLLECTION, Database, GIVEAWAYS_COLLECTION, MUTES_COLLECTION};
pub use repository::{GiveawayRepository, MuteRepository, OutboxRepository};
pub use store::{GiveawayStore, MuteStore};
