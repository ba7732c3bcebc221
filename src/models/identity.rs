//! Identity: the canonical, shared representation of one remote account

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Relationship, Visibility};
use crate::json::JsonExt;
use crate::lock::{read, write};

/// A profile metadata field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Label
    pub name: String,
    /// Value (HTML)
    pub value: String,
    /// When the link in `value` was verified, if ever
    pub verified_at: Option<String>,
}

/// Profile data of an identity (a snapshot; see [`Identity::data`])
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityData {
    /// Server-side account id (used in `/api/v1/accounts/{id}/...`)
    pub id: String,
    /// Local username
    pub username: String,
    /// `user` for local accounts, `user@domain` for remote ones
    pub acct: String,
    /// Display name
    pub display_name: String,
    /// Bio (HTML)
    pub bio: String,
    /// Profile page URL
    pub url: String,
    /// Avatar image URL
    pub avatar_url: String,
    /// Header image URL
    pub background_url: String,
    /// Follow requests must be approved
    pub locked: bool,
    /// Automated account
    pub bot: bool,
    /// Opted into discovery features
    pub discoverable: bool,
    /// Default post visibility (only known for our own account)
    pub visibility: Visibility,
    /// Followers
    pub followers_count: u64,
    /// Following
    pub following_count: u64,
    /// Posts
    pub statuses_count: u64,
    /// Profile metadata fields
    pub fields: Vec<Field>,
}

impl IdentityData {
    /// Parse an account object
    pub fn from_json(json: &Value) -> Self {
        let source = json.at("source");
        let fields = json
            .array_at("fields")
            .iter()
            .map(|f| Field {
                name: f.str_at("name"),
                value: f.str_at("value"),
                verified_at: f.opt_str_at("verified_at"),
            })
            .collect();

        Self {
            id: json.str_at("id"),
            username: json.str_at("username"),
            acct: json.str_at("acct"),
            display_name: json.str_at("display_name"),
            bio: json.str_at("note"),
            url: json.str_at("url"),
            avatar_url: json.str_at("avatar"),
            background_url: json.str_at("header"),
            locked: json.bool_at("locked"),
            bot: json.bool_at("bot"),
            discoverable: json.bool_at("discoverable"),
            visibility: Visibility::from_server(&source.str_at("privacy")),
            followers_count: json.u64_at("followers_count").unwrap_or(0),
            following_count: json.u64_at("following_count").unwrap_or(0),
            statuses_count: json.u64_at("statuses_count").unwrap_or(0),
            fields,
        }
    }
}

/// One remote account.
///
/// There is exactly one `Identity` per account handle per session, handed out
/// as `Arc<Identity>` by the [`IdentityCache`](crate::IdentityCache). Updates
/// go through `&self` so every holder sees them.
#[derive(Debug, Default)]
pub struct Identity {
    data: RwLock<IdentityData>,
    relationship: RwLock<Option<Relationship>>,
}

impl Identity {
    /// Build an identity from an account object
    pub fn from_json(json: &Value) -> Self {
        Self {
            data: RwLock::new(IdentityData::from_json(json)),
            relationship: RwLock::new(None),
        }
    }

    /// Overwrite every profile field from fresher JSON.
    /// The relationship is left alone.
    pub fn update_from_json(&self, json: &Value) {
        *write(&self.data) = IdentityData::from_json(json);
    }

    /// Snapshot of the profile data
    pub fn data(&self) -> IdentityData {
        read(&self.data).clone()
    }

    /// Account handle (the cache key)
    pub fn acct(&self) -> String {
        read(&self.data).acct.clone()
    }

    /// Server-side account id
    pub fn id(&self) -> String {
        read(&self.data).id.clone()
    }

    /// Local username
    pub fn username(&self) -> String {
        read(&self.data).username.clone()
    }

    /// Display name, falling back to the username when unset
    pub fn display_name(&self) -> String {
        let data = read(&self.data);
        if data.display_name.is_empty() {
            data.username.clone()
        } else {
            data.display_name.clone()
        }
    }

    /// Avatar URL
    pub fn avatar_url(&self) -> String {
        read(&self.data).avatar_url.clone()
    }

    /// Profile page URL
    pub fn url(&self) -> String {
        read(&self.data).url.clone()
    }

    /// Default post visibility
    pub fn visibility(&self) -> Visibility {
        read(&self.data).visibility
    }

    /// Relationship with the logged-in user, once fetched
    pub fn relationship(&self) -> Option<Relationship> {
        read(&self.relationship).clone()
    }

    /// Replace the relationship
    pub fn set_relationship(&self, relationship: Relationship) {
        *write(&self.relationship) = Some(relationship);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account_json() -> Value {
        json!({
            "id": "109",
            "username": "alice",
            "acct": "alice@example.social",
            "display_name": "",
            "note": "<p>hi</p>",
            "avatar": "https://example.social/a.png",
            "header": "https://example.social/h.png",
            "locked": true,
            "followers_count": 12,
            "following_count": "3",
            "statuses_count": 400,
            "source": {"privacy": "unlisted"},
            "fields": [{"name": "web", "value": "<a>x</a>", "verified_at": null}]
        })
    }

    #[test]
    fn test_from_json() {
        let identity = Identity::from_json(&account_json());
        let data = identity.data();
        assert_eq!(identity.acct(), "alice@example.social");
        assert_eq!(identity.id(), "109");
        assert_eq!(identity.display_name(), "alice");
        assert!(data.locked);
        assert_eq!(data.following_count, 3);
        assert_eq!(data.visibility, Visibility::Unlisted);
        assert_eq!(data.fields.len(), 1);
        assert_eq!(data.fields[0].verified_at, None);
        assert!(identity.relationship().is_none());
    }

    #[test]
    fn test_update_overwrites() {
        let identity = Identity::from_json(&account_json());
        identity.set_relationship(Relationship {
            following: true,
            ..Default::default()
        });

        identity.update_from_json(&json!({"acct": "alice@example.social", "display_name": "Alice"}));

        let data = identity.data();
        assert_eq!(data.display_name, "Alice");
        assert_eq!(data.followers_count, 0);
        assert!(data.fields.is_empty());
        assert!(identity.relationship().is_some_and(|r| r.following));
    }
}
