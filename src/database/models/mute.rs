//! Mute records.

use std::fmt;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Identifies a muted member: one mute per user per guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MuteKey {
    pub guild_id: u64,
    pub user_id: u64,
}

impl MuteKey {
    pub fn new(guild_id: u64, user_id: u64) -> Self {
        Self { guild_id, user_id }
    }
}

impl fmt::Display for MuteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.guild_id, self.user_id)
    }
}

/// A mute stored in the `mutes` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mute {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub guild_id: u64,
    pub user_id: u64,

    /// Role granted while muted, removed on expiry
    pub role_id: u64,

    /// Moderator who issued the mute
    pub moderator_id: u64,

    #[serde(default)]
    pub reason: Option<String>,

    pub created_at: DateTime<Utc>,

    /// When the mute ends (None = permanent)
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,

    /// False once the mute was lifted
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Mute {
    /// Create a new permanent mute.
    pub fn new(guild_id: u64, user_id: u64, role_id: u64, moderator_id: u64) -> Self {
        Self {
            id: None,
            guild_id,
            user_id,
            role_id,
            moderator_id,
            reason: None,
            created_at: Utc::now(),
            ends_at: None,
            active: true,
        }
    }

    /// Make the mute temporary, ending `duration` after creation.
    #[must_use]
    pub fn lasting(mut self, duration: chrono::Duration) -> Self {
        self.ends_at = Some(self.created_at + duration);
        self
    }

    /// Set the end time explicitly.
    #[must_use]
    pub fn until(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn key(&self) -> MuteKey {
        MuteKey::new(self.guild_id, self.user_id)
    }

    /// Check if the mute is temporary and its end time has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|end| end <= now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_lasting_mute_ends_after_creation() {
        let mute = Mute::new(1, 2, 3, 4)
            .lasting(Duration::minutes(10))
            .with_reason("spam");

        assert_eq!(mute.ends_at, Some(mute.created_at + Duration::minutes(10)));
        assert_eq!(mute.reason.as_deref(), Some("spam"));
        assert_eq!(mute.key().to_string(), "1:2");

        assert!(!mute.is_overdue(mute.created_at));
        assert!(mute.is_overdue(mute.created_at + Duration::minutes(10)));
    }

    #[test]
    fn test_permanent_mute_is_never_overdue() {
        let mute = Mute::new(1, 2, 3, 4);
        assert!(mute.ends_at.is_none());
        assert!(!mute.is_overdue(Utc::now() + Duration::days(365)));
    }
}
