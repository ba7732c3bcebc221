//! Viewer-to-account relationship

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json::JsonExt;

/// The social-graph state between the logged-in user and another account.
///
/// Always replaced wholesale from server JSON; a field missing from the
/// response resets to its default rather than keeping the old value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Server-side account id this relationship refers to
    pub id: String,
    /// We follow them
    pub following: bool,
    /// Our follow request is pending
    pub requested: bool,
    /// We feature them on our profile
    pub endorsed: bool,
    /// They follow us
    pub followed_by: bool,
    /// We mute them
    pub muting: bool,
    /// We also mute their notifications
    pub muting_notifications: bool,
    /// Their boosts show in our home timeline
    pub showing_reblogs: bool,
    /// We get notified when they post
    pub notifying: bool,
    /// We block them
    pub blocking: bool,
    /// We block their whole domain
    pub domain_blocking: bool,
    /// They block us
    pub blocked_by: bool,
    /// Our private note about them
    pub note: String,
}

impl Relationship {
    /// Build from a relationship object
    pub fn from_json(json: &Value) -> Self {
        Self {
            id: json.str_at("id"),
            following: json.bool_at("following"),
            requested: json.bool_at("requested"),
            endorsed: json.bool_at("endorsed"),
            followed_by: json.bool_at("followed_by"),
            muting: json.bool_at("muting"),
            muting_notifications: json.bool_at("muting_notifications"),
            showing_reblogs: json.bool_at("showing_reblogs"),
            notifying: json.bool_at("notifying"),
            blocking: json.bool_at("blocking"),
            domain_blocking: json.bool_at("domain_blocking"),
            blocked_by: json.bool_at("blocked_by"),
            note: json.str_at("note"),
        }
    }
}
