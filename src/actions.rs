//! Relationship actions and their endpoints

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Something the user can do to another account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountAction {
    /// Follow
    Follow,
    /// Unfollow
    Unfollow,
    /// Block
    Block,
    /// Unblock
    Unblock,
    /// Mute
    Mute,
    /// Unmute
    Unmute,
    /// Feature on our profile (the server calls this "pin")
    Feature,
    /// Stop featuring
    Unfeature,
    /// Set or clear our private note
    Note,
}

impl AccountAction {
    /// All actions
    pub const fn all() -> &'static [Self] {
        &[
            Self::Follow,
            Self::Unfollow,
            Self::Block,
            Self::Unblock,
            Self::Mute,
            Self::Unmute,
            Self::Feature,
            Self::Unfeature,
            Self::Note,
        ]
    }

    /// Suffix appended to `/api/v1/accounts/{id}`
    pub const fn path_suffix(&self) -> &'static str {
        match self {
            Self::Follow => "/follow",
            Self::Unfollow => "/unfollow",
            Self::Block => "/block",
            Self::Unblock => "/unblock",
            Self::Mute => "/mute",
            Self::Unmute => "/unmute",
            Self::Feature => "/pin",
            Self::Unfeature => "/unpin",
            Self::Note => "/note",
        }
    }

    /// Message shown to the user when the action fails
    pub const fn failure_message(&self) -> &'static str {
        match self {
            Self::Follow => "Could not follow account",
            Self::Unfollow => "Could not unfollow account",
            Self::Block => "Could not block account",
            Self::Unblock => "Could not unblock account",
            Self::Mute => "Could not mute account",
            Self::Unmute => "Could not unmute account",
            Self::Feature => "Could not feature account",
            Self::Unfeature => "Could not unfeature account",
            Self::Note => "Could not edit note about an account",
        }
    }

    /// Command-line name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::Block => "block",
            Self::Unblock => "unblock",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Feature => "feature",
            Self::Unfeature => "unfeature",
            Self::Note => "note",
        }
    }

    /// Parse a command-line name
    pub fn from_name(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|a| a.name() == s)
    }
}

impl fmt::Display for AccountAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Body for a follow
pub fn follow_args(reblogs: bool, notify: bool) -> Value {
    json!({ "reblogs": reblogs, "notify": notify })
}

/// Body for a mute; `duration` is in seconds, 0 meaning indefinitely
pub fn mute_args(notifications: bool, duration: u64) -> Value {
    json!({ "notifications": notifications, "duration": duration })
}

/// Body for a note. An empty note sends no `comment` at all, which clears it.
pub fn note_args(note: &str) -> Value {
    let mut body = Map::new();
    if !note.is_empty() {
        body.insert("comment".to_string(), Value::String(note.to_string()));
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_uses_pin_endpoint() {
        assert_eq!(AccountAction::Feature.path_suffix(), "/pin");
        assert_eq!(AccountAction::Unfeature.path_suffix(), "/unpin");
    }

    #[test]
    fn test_names() {
        for action in AccountAction::all() {
            assert_eq!(AccountAction::from_name(action.name()), Some(*action));
        }
        assert_eq!(AccountAction::from_name("poke"), None);
    }

    #[test]
    fn test_note_args() {
        assert_eq!(note_args(""), json!({}));
        assert_eq!(note_args("friend"), json!({"comment": "friend"}));
    }

    #[test]
    fn test_mute_args() {
        assert_eq!(
            mute_args(true, 0),
            json!({"notifications": true, "duration": 0})
        );
    }
}
