//! Notification model

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Identity, Post};
use crate::cache::IdentityCache;
use crate::json::JsonExt;

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Someone mentioned us
    Mention,
    /// Someone we enabled notifications for posted
    Status,
    /// Someone boosted our post
    Repeat,
    /// Someone followed us
    Follow,
    /// Someone asked to follow us
    FollowRequest,
    /// Someone favourited our post
    Favorite,
    /// A poll we voted in or created ended
    Poll,
    /// A post we interacted with was edited
    Update,
    /// A type this client does not know (admin notifications, new server
    /// features)
    Unknown,
}

const TYPE_TABLE: &[(&str, NotificationType)] = &[
    ("mention", NotificationType::Mention),
    ("status", NotificationType::Status),
    ("reblog", NotificationType::Repeat),
    ("follow", NotificationType::Follow),
    ("follow_request", NotificationType::FollowRequest),
    ("favourite", NotificationType::Favorite),
    ("poll", NotificationType::Poll),
    ("update", NotificationType::Update),
];

impl NotificationType {
    /// Map a server `type` string
    pub fn from_server(s: &str) -> Self {
        TYPE_TABLE
            .iter()
            .find(|(name, _)| *name == s)
            .map_or_else(
                || {
                    tracing::info!("unrecognised notification type {s:?}");
                    Self::Unknown
                },
                |(_, kind)| *kind,
            )
    }

    /// Server string; `None` for [`Unknown`](Self::Unknown)
    pub fn as_server_str(&self) -> Option<&'static str> {
        TYPE_TABLE
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(name, _)| *name)
    }
}

/// One delivered notification. Not cached: each delivery is a new value.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Notification id
    pub id: String,
    /// Kind
    pub kind: NotificationType,
    /// Who triggered it
    pub identity: Arc<Identity>,
    /// The post it is about; `None` for follows and other post-less kinds
    pub post: Option<Post>,
    /// When it happened
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Normalize a notification object, resolving the actor and any post
    /// authors through the cache
    pub fn from_json(cache: &IdentityCache, json: &Value) -> Self {
        let account = json.at("account");
        let status = json.at("status");

        let post = if status.is_empty_object() {
            None
        } else {
            Some(Post::from_json(cache, status))
        };

        Self {
            id: json.str_at("id"),
            kind: NotificationType::from_server(&json.str_at("type")),
            identity: cache.lookup(&account.str_at("acct"), account),
            post,
            created_at: json
                .opt_str_at("created_at")
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}
