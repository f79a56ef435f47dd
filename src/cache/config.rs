//! Cache configuration.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::config::ConfigError;

/// What a re-`set` does to a key that already has an armed timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RearmPolicy {
    /// Keep the timer armed by the first insertion; later deadlines are ignored.
    #[default]
    KeepFirst,
    /// Cancel the pending timer and arm again from the new value's deadline.
    ResetOnUpdate,
}

impl RearmPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepFirst => "keep-first",
            Self::ResetOnUpdate => "reset-on-update",
        }
    }
}

impl FromStr for RearmPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep-first" | "keep_first" => Ok(Self::KeepFirst),
            "reset-on-update" | "reset_on_update" => Ok(Self::ResetOnUpdate),
            other => Err(ConfigError::UnknownRearmPolicy(other.to_string())),
        }
    }
}

/// Configuration shared by every map in a [`CacheRegistry`](super::CacheRegistry).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in each map.
    pub max_size: NonZeroUsize,

    /// How often the registry sweeps idle maps. Fixed once the registry exists.
    pub sweep_interval: Duration,

    /// Behaviour when an armed key is inserted again.
    pub rearm_policy: RearmPolicy,

    /// Whether `delete` cancels a pending timer for the removed key.
    pub cancel_on_delete: bool,
}

impl CacheConfig {
    /// Create a validated config. Both values must be positive.
    pub fn new(max_size: usize, sweep_interval_secs: u64) -> Result<Self, ConfigError> {
        let max_size = NonZeroUsize::new(max_size).ok_or(ConfigError::ZeroCapacity)?;
        if sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }

        Ok(Self {
            max_size,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            rearm_policy: RearmPolicy::default(),
            cancel_on_delete: true,
        })
    }

    /// Set the re-arm policy (builder pattern).
    #[must_use]
    pub fn rearm_policy(mut self, policy: RearmPolicy) -> Self {
        self.rearm_policy = policy;
        self
    }

    /// Set whether `delete` cancels pending timers.
    #[must_use]
    pub fn cancel_on_delete(mut self, cancel: bool) -> Self {
        self.cancel_on_delete = cancel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_values() {
        assert!(matches!(CacheConfig::new(0, 60), Err(ConfigError::ZeroCapacity)));
        assert!(matches!(CacheConfig::new(10, 0), Err(ConfigError::ZeroSweepInterval)));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("keep-first".parse::<RearmPolicy>().unwrap(), RearmPolicy::KeepFirst);
        assert_eq!(
            " Reset-On-Update ".parse::<RearmPolicy>().unwrap(),
            RearmPolicy::ResetOnUpdate
        );
        assert!("latest".parse::<RearmPolicy>().is_err());
        assert_eq!(RearmPolicy::ResetOnUpdate.as_str(), "reset-on-update");
    }
}
