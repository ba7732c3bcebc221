//! Instance capabilities.
//!
//! Mastodon, glitch-soc, Pleroma and Akkoma report their limits in different
//! places. [`Capabilities`] collects whatever each source reports; a field a
//! source does not mention keeps its previous value.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::MetadataSource;
use crate::json::JsonExt;

/// Set of post content types the instance accepts
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentTypes(u32);

impl ContentTypes {
    /// `text/plain`
    pub const PLAIN_TEXT: Self = Self(1);
    /// `text/markdown`
    pub const MARKDOWN: Self = Self(1 << 1);
    /// `text/html`
    pub const HTML: Self = Self(1 << 2);
    /// `text/bbcode`
    pub const BBCODE: Self = Self(1 << 3);

    const MIME_TABLE: &'static [(&'static str, Self)] = &[
        ("text/plain", Self::PLAIN_TEXT),
        ("text/bbcode", Self::BBCODE),
        ("text/html", Self::HTML),
        ("text/markdown", Self::MARKDOWN),
    ];

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flag for a MIME string; `None` if unknown
    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::MIME_TABLE
            .iter()
            .find(|(name, _)| *name == mime)
            .map(|(_, flag)| *flag)
    }

    /// MIME strings of the set flags
    pub fn mime_types(self) -> Vec<&'static str> {
        Self::MIME_TABLE
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for ContentTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ContentTypes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ContentTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.mime_types()).finish()
    }
}

/// Content types implied by a version string. glitch-soc accepts Markdown
/// and HTML on top of plain text.
pub fn parse_version(version: &str) -> ContentTypes {
    let mut result = ContentTypes::PLAIN_TEXT;
    if version.contains("glitch") {
        result |= ContentTypes::MARKDOWN | ContentTypes::HTML;
    }
    result
}

/// Content types listed in a nodeinfo document's `metadata.postFormats`.
/// Unknown formats are skipped.
pub fn parse_node_info(json: &Value) -> ContentTypes {
    json.at("metadata")
        .array_at("postFormats")
        .iter()
        .filter_map(Value::as_str)
        .filter_map(ContentTypes::from_mime)
        .fold(ContentTypes::PLAIN_TEXT, BitOr::bitor)
}

/// What the connected instance supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Maximum post length in characters
    pub max_post_length: u64,
    /// Characters counted for any URL
    pub characters_reserved_per_url: u64,
    /// Maximum poll options
    pub max_poll_options: u64,
    /// Accepted content types
    pub content_types: ContentTypes,
    /// Sign-ups are open
    pub registrations_open: bool,
    /// Message shown on the sign-up form
    pub registration_message: String,
    /// Pleroma-family "local" visibility is available
    pub supports_local_visibility: bool,
    /// Instance display name
    pub instance_name: String,
    /// Reported software version
    pub version: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_post_length: 500,
            characters_reserved_per_url: 23,
            max_poll_options: 4,
            content_types: ContentTypes::PLAIN_TEXT,
            registrations_open: false,
            registration_message: String::new(),
            supports_local_visibility: false,
            instance_name: String::new(),
            version: String::new(),
        }
    }
}

impl Capabilities {
    /// Start a fresh metadata round: content types go back to plain text so
    /// the flags that follow reflect only this round's sources.
    pub fn begin_fetch(&mut self) {
        self.content_types = ContentTypes::PLAIN_TEXT;
    }

    /// Apply an `/api/v2/instance` or `/api/v1/instance` document
    pub fn apply_instance(&mut self, json: &Value, source: MetadataSource) {
        let statuses = json.at("configuration").at("statuses");
        if let Some(n) = statuses.u64_at("max_characters") {
            self.max_post_length = n;
        }
        if let Some(n) = statuses.u64_at("characters_reserved_per_url") {
            self.characters_reserved_per_url = n;
        }

        if let Some(version) = json.get("version").and_then(Value::as_str) {
            self.version = version.to_string();
            self.content_types |= parse_version(version);
        }

        // Pleroma and Akkoma
        if let Some(n) = json.u64_at("max_toot_chars") {
            self.max_post_length = n;
        }
        if let Some(n) = json.at("poll_limits").u64_at("max_options") {
            self.max_poll_options = n;
        }

        let polls = json.at("configuration").at("polls");
        if let Some(n) = polls.u64_at("max_options").or_else(|| json.at("polls").u64_at("max_options")) {
            self.max_poll_options = n;
        }

        match (source, json.at("registrations")) {
            (MetadataSource::InstanceV1, Value::Bool(open)) => self.registrations_open = *open,
            (_, registrations @ Value::Object(_)) => {
                self.registrations_open = registrations.bool_at("enabled");
                self.registration_message = registrations.str_at("message");
            }
            _ => {}
        }

        self.supports_local_visibility = json.has("pleroma");

        if let Some(title) = json.opt_str_at("title") {
            self.instance_name = title;
        }
    }

    /// Merge a nodeinfo document's content types into the current set
    pub fn apply_node_info(&mut self, json: &Value) {
        self.content_types |= parse_node_info(json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let caps = Capabilities::default();
        assert_eq!(caps.max_post_length, 500);
        assert_eq!(caps.characters_reserved_per_url, 23);
        assert_eq!(caps.max_poll_options, 4);
        assert_eq!(caps.content_types, ContentTypes::PLAIN_TEXT);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("4.2.0"), ContentTypes::PLAIN_TEXT);
        let glitch = parse_version("4.2.0+glitch");
        assert!(glitch.contains(ContentTypes::MARKDOWN | ContentTypes::HTML | ContentTypes::PLAIN_TEXT));
        assert!(!glitch.contains(ContentTypes::BBCODE));
    }

    #[test]
    fn test_parse_node_info() {
        let types = parse_node_info(&json!({
            "metadata": {"postFormats": ["text/plain", "text/bbcode", "text/x-unknown", 3]}
        }));
        assert_eq!(types, ContentTypes::PLAIN_TEXT | ContentTypes::BBCODE);
        assert_eq!(parse_node_info(&json!({})), ContentTypes::PLAIN_TEXT);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let instance = json!({"version": "4.1.0+glitch"});
        let node_info = json!({"metadata": {"postFormats": ["text/html"]}});
        let expected = ContentTypes::PLAIN_TEXT | ContentTypes::MARKDOWN | ContentTypes::HTML;

        let mut a = Capabilities::default();
        a.begin_fetch();
        a.apply_instance(&instance, MetadataSource::InstanceV2);
        a.apply_node_info(&node_info);

        let mut b = Capabilities::default();
        b.begin_fetch();
        b.apply_node_info(&node_info);
        b.apply_instance(&instance, MetadataSource::InstanceV2);

        assert_eq!(a.content_types, expected);
        assert_eq!(b.content_types, expected);
    }

    #[test]
    fn test_v2_document() {
        let mut caps = Capabilities::default();
        caps.apply_instance(
            &json!({
                "title": "Example",
                "version": "4.3.0",
                "configuration": {
                    "statuses": {"max_characters": 1000, "characters_reserved_per_url": 23},
                    "polls": {"max_options": 6}
                },
                "registrations": {"enabled": true, "message": "<p>be nice</p>"}
            }),
            MetadataSource::InstanceV2,
        );
        assert_eq!(caps.instance_name, "Example");
        assert_eq!(caps.max_post_length, 1000);
        assert_eq!(caps.max_poll_options, 6);
        assert!(caps.registrations_open);
        assert_eq!(caps.registration_message, "<p>be nice</p>");
        assert!(!caps.supports_local_visibility);
    }

    #[test]
    fn test_pleroma_v1_document() {
        let mut caps = Capabilities::default();
        caps.apply_instance(
            &json!({
                "title": "Akkoma",
                "version": "2.7.2 (compatible; Akkoma 3.10)",
                "max_toot_chars": 5000,
                "poll_limits": {"max_options": 20},
                "registrations": true,
                "pleroma": {"metadata": {}}
            }),
            MetadataSource::InstanceV1,
        );
        assert_eq!(caps.max_post_length, 5000);
        assert_eq!(caps.max_poll_options, 20);
        assert!(caps.registrations_open);
        assert!(caps.supports_local_visibility);
    }

    #[test]
    fn test_absent_fields_untouched() {
        let mut caps = Capabilities {
            max_post_length: 1234,
            instance_name: "Old".into(),
            ..Default::default()
        };
        caps.apply_instance(&json!({}), MetadataSource::InstanceV2);
        assert_eq!(caps.max_post_length, 1234);
        assert_eq!(caps.instance_name, "Old");
    }
}
