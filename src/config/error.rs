//! Configuration errors.

use thiserror::Error;

/// Errors raised while loading configuration. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("cache capacity must be a positive integer")]
    ZeroCapacity,

    #[error("cache sweep interval must be a positive number of seconds")]
    ZeroSweepInterval,

    #[error("unknown rearm policy {0:?} (expected keep-first or reset-on-update)")]
    UnknownRearmPolicy(String),
}
