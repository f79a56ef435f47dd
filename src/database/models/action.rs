//! Outbox actions for the chat-facing process.

use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Work the chat gateway has to carry out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    RemoveMuteRole {
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    },
    AnnounceGiveaway {
        guild_id: u64,
        channel_id: u64,
        message_id: u64,
        prize: String,
        winners: Vec<u64>,
    },
}

/// An action queued in the `pending_actions` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(flatten)]
    pub action: ActionKind,

    /// Stored as a BSON date so consumers can sort by it
    pub created_at: DateTime,

    /// Set by the consumer once delivered
    #[serde(default)]
    pub delivered: bool,
}

impl PendingAction {
    pub fn new(action: ActionKind) -> Self {
        Self {
            id: None,
            action,
            created_at: DateTime::now(),
            delivered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{Bson, to_document};

    use super::*;

    #[test]
    fn test_document_layout() {
        let pending = PendingAction::new(ActionKind::RemoveMuteRole {
            guild_id: 1,
            user_id: 2,
            role_id: 3,
        });
        let doc = to_document(&pending).unwrap();

        assert!(!doc.contains_key("_id"));
        assert_eq!(doc.get_str("kind").unwrap(), "remove_mute_role");
        assert!(matches!(doc.get("created_at"), Some(Bson::DateTime(_))));
        assert!(!doc.get_bool("delivered").unwrap());
    }
}
