//! Server-side user preferences

use serde_json::Value;

use super::{Post, Visibility};
use crate::json::JsonExt;

/// How media in received posts is revealed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaExpansion {
    /// Hidden only when marked sensitive
    #[default]
    Default,
    /// Always shown
    ShowAll,
    /// Always hidden
    HideAll,
}

impl MediaExpansion {
    /// Parse the server's `reading:expand:media` value; unknown values
    /// fall back to [`MediaExpansion::Default`]
    pub fn from_server(s: &str) -> Self {
        match s {
            "show_all" => Self::ShowAll,
            "hide_all" => Self::HideAll,
            _ => Self::Default,
        }
    }

    /// Wire representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ShowAll => "show_all",
            Self::HideAll => "hide_all",
        }
    }
}

/// Posting and reading defaults stored on the server
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preferences {
    pub default_visibility: Visibility,
    pub default_sensitive: bool,
    /// ISO 639 code, if the user set one
    pub default_language: Option<String>,
    pub expand_media: MediaExpansion,
    /// Open content warnings automatically
    pub expand_spoilers: bool,
}

impl Preferences {
    /// Parse `GET /api/v1/preferences`. Missing keys keep their defaults.
    pub fn from_json(json: &Value) -> Self {
        Self {
            default_visibility: Visibility::from_server(&json.str_at("posting:default:visibility")),
            default_sensitive: json.bool_at("posting:default:sensitive"),
            default_language: json.opt_str_at("posting:default:language"),
            expand_media: MediaExpansion::from_server(&json.str_at("reading:expand:media")),
            expand_spoilers: json.bool_at("reading:expand:spoilers"),
        }
    }

    /// Apply the reading preferences to a freshly received post
    pub fn apply_reading(&self, post: &mut Post) {
        if self.expand_spoilers {
            post.expanded = true;
        }
        match self.expand_media {
            MediaExpansion::Default => {}
            MediaExpansion::ShowAll => post.attachments_visible = true,
            MediaExpansion::HideAll => post.attachments_visible = false,
        }
    }

    /// Apply the posting preferences to a new draft
    pub fn apply_posting(&self, draft: &mut Post) {
        draft.visibility = self.default_visibility;
        draft.sensitive = self.default_sensitive;
        draft.language.clone_from(&self.default_language);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::cache::IdentityCache;
    use crate::models::Identity;

    #[test]
    fn test_from_json() {
        let prefs = Preferences::from_json(&json!({
            "posting:default:visibility": "unlisted",
            "posting:default:sensitive": true,
            "posting:default:language": "fr",
            "reading:expand:media": "hide_all",
            "reading:expand:spoilers": true
        }));
        assert_eq!(prefs.default_visibility, Visibility::Unlisted);
        assert!(prefs.default_sensitive);
        assert_eq!(prefs.default_language.as_deref(), Some("fr"));
        assert_eq!(prefs.expand_media, MediaExpansion::HideAll);
        assert!(prefs.expand_spoilers);
    }

    #[test]
    fn test_missing_and_null_keys() {
        let prefs = Preferences::from_json(&json!({"posting:default:language": null}));
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.expand_media.as_str(), "default");
    }

    #[test]
    fn test_apply_reading() {
        let cache = IdentityCache::new();
        let status = json!({
            "id": "1", "account": {"acct": "alice"},
            "spoiler_text": "cw", "sensitive": false
        });

        let mut post = Post::from_json(&cache, &status);
        assert!(!post.expanded && post.attachments_visible);

        let prefs = Preferences {
            expand_spoilers: true,
            expand_media: MediaExpansion::HideAll,
            ..Default::default()
        };
        prefs.apply_reading(&mut post);
        assert!(post.expanded);
        assert!(!post.attachments_visible);

        let mut untouched = Post::from_json(&cache, &status);
        Preferences::default().apply_reading(&mut untouched);
        assert!(!untouched.expanded && untouched.attachments_visible);
    }

    #[test]
    fn test_apply_posting() {
        let mut draft = Post::draft(Arc::new(Identity::default()), Visibility::Public);
        let prefs = Preferences {
            default_visibility: Visibility::Private,
            default_sensitive: true,
            default_language: Some("de".into()),
            ..Default::default()
        };
        prefs.apply_posting(&mut draft);
        assert_eq!(draft.visibility, Visibility::Private);
        assert!(draft.sensitive);
        assert_eq!(draft.language.as_deref(), Some("de"));
    }
}
