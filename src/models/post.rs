//! Post/status model and its attachments

use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::AbortHandle;
use url::Url;

use super::Identity;
use crate::api::{Method, Request, Response, Transport};
use crate::cache::IdentityCache;
use crate::events::{Event, EventBus};
use crate::json::JsonExt;
use crate::lock::lock;

static HTML_TAG: LazyLock<Option<regex_lite::Regex>> =
    LazyLock::new(|| regex_lite::Regex::new(r"<[^>]+>").ok());

/// Who can see a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Everyone, listed on public timelines
    #[default]
    Public,
    /// Everyone, but kept off public timelines
    Unlisted,
    /// Followers only
    Private,
    /// Mentioned accounts only
    Direct,
}

impl Visibility {
    /// All variants
    pub const fn all() -> &'static [Self] {
        &[Self::Public, Self::Unlisted, Self::Private, Self::Direct]
    }

    /// Server string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
            Self::Direct => "direct",
        }
    }

    /// Parse a server string; anything unknown is `Public`
    pub fn from_server(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// A visibility string the server should never send
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown visibility: {0}")]
pub struct UnknownVisibility(pub String);

impl FromStr for Visibility {
    type Err = UnknownVisibility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "unlisted" => Ok(Self::Unlisted),
            "private" => Ok(Self::Private),
            "direct" => Ok(Self::Direct),
            other => Err(UnknownVisibility(other.to_string())),
        }
    }
}

/// Kind of media attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    /// Still image
    Image,
    /// Looping silent video (Mastodon's animated GIF)
    GifV,
    /// Video
    Video,
    /// Audio or anything else
    #[default]
    Unknown,
}

impl AttachmentType {
    /// Parse a server string; anything unknown is `Unknown`
    pub fn from_server(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "gifv" => Self::GifV,
            "video" => Self::Video,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Default)]
struct Preview {
    bytes: Mutex<Option<Vec<u8>>>,
    task: Mutex<Option<AbortHandle>>,
}

impl Drop for Preview {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = task.take() {
            task.abort();
        }
    }
}

/// Media attached to a post. Owned by its post; clones share the preview.
#[derive(Debug, Clone, Default)]
pub struct Attachment {
    /// Media id (used in `media_ids` when posting)
    pub id: String,
    /// Full-size URL
    pub url: String,
    /// Thumbnail URL
    pub preview_url: String,
    /// Alt text
    pub description: String,
    /// Media kind
    pub kind: AttachmentType,
    preview: Arc<Preview>,
}

impl Attachment {
    /// Parse a media attachment object. Objects without a `type` carry no
    /// usable data and come back empty.
    pub fn from_json(json: &Value) -> Self {
        if !json.has("type") {
            return Self::default();
        }

        Self {
            id: json.str_at("id"),
            url: json.str_at("url"),
            preview_url: json.str_at("preview_url"),
            description: json.str_at("description"),
            kind: AttachmentType::from_server(&json.str_at("type")),
            preview: Arc::default(),
        }
    }

    /// Preview bytes, once fetched
    pub fn preview(&self) -> Option<Vec<u8>> {
        lock(&self.preview.bytes).clone()
    }

    /// Abort an in-flight preview fetch, if any
    pub fn cancel_preview_fetch(&self) {
        if let Some(task) = lock(&self.preview.task).take() {
            tracing::debug!("cancelling preview fetch for attachment {}", self.id);
            task.abort();
        }
    }

    /// Fetch the preview image bytes in the background.
    ///
    /// Supersedes any earlier fetch for this attachment. The result is
    /// discarded if the attachment is dropped first. Must be called from
    /// within a Tokio runtime.
    pub fn fetch_preview(&self, transport: Arc<dyn Transport>, events: EventBus) {
        let url = match Url::parse(&self.preview_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("attachment {} has no usable preview URL: {e}", self.id);
                return;
            }
        };

        self.cancel_preview_fetch();

        let preview = Arc::downgrade(&self.preview);
        let attachment_id = self.id.clone();
        let task = tokio::spawn(async move {
            let result = transport
                .execute(Request::new(Method::Get, url))
                .await
                .and_then(Response::error_for_status);

            let Some(preview) = preview.upgrade() else {
                tracing::debug!("attachment {attachment_id} dropped; discarding preview");
                return;
            };

            match result {
                Ok(response) => {
                    *lock(&preview.bytes) = Some(response.body);
                    events.emit(Event::AttachmentPreviewFetched { attachment_id });
                }
                Err(e) => tracing::warn!("Failed to load preview for {attachment_id}: {e}"),
            }
        });

        *lock(&self.preview.task) = Some(task.abort_handle());
    }
}

/// A post/status
#[derive(Debug, Clone)]
pub struct Post {
    /// Post id
    pub id: String,
    /// Content warning
    pub subject: String,
    /// Content (HTML)
    pub content: String,
    /// Source content type (Pleroma/glitch-soc); empty when not reported
    pub content_type: String,
    /// Marked sensitive
    pub sensitive: bool,
    /// Visibility (of the boosted post, for boosts)
    pub visibility: Visibility,
    /// Id to reply to (the boosted post's id, for boosts)
    pub reply_target_id: String,
    /// Id of the post this one replies to
    pub in_reply_to_id: Option<String>,
    /// ISO 639 language code
    pub language: Option<String>,
    /// Web URL
    pub url: Option<String>,
    /// Creation time
    pub created_at: Option<DateTime<Utc>>,
    /// We favourited it
    pub favorited: bool,
    /// We boosted it
    pub repeated: bool,
    /// We bookmarked it
    pub bookmarked: bool,
    /// Pinned on its author's profile
    pub pinned: bool,
    /// Replies
    pub replies_count: u64,
    /// Boosts
    pub reblogs_count: u64,
    /// Favourites
    pub favourites_count: u64,
    /// This entry is a boost
    pub repeat: bool,
    /// Original author
    pub author_identity: Arc<Identity>,
    /// Booster, for boosts
    pub repeat_identity: Option<Arc<Identity>>,
    /// Mentioned account handles, in order
    pub mentions: Vec<String>,
    /// Media
    pub attachments: Vec<Attachment>,
    /// Content is shown (no content warning, or the user opened it)
    pub expanded: bool,
    /// Media is shown (not sensitive, or the user revealed it)
    pub attachments_visible: bool,
}

impl Post {
    /// Normalize a status object, resolving authors through the cache.
    ///
    /// For a boost, `author_identity` is the original author and
    /// `repeat_identity` the booster; visibility, reply target, mentions and
    /// attachments come from the boosted post.
    pub fn from_json(cache: &IdentityCache, json: &Value) -> Self {
        let account = json.at("account");
        let acct = account.str_at("acct");
        let reblog = json.at("reblog");
        let repeat = !reblog.is_empty_object();

        let (author_identity, repeat_identity) = if repeat {
            let original = reblog.at("account");
            (
                cache.lookup(&original.str_at("acct"), original),
                Some(cache.lookup(&acct, account)),
            )
        } else {
            (cache.lookup(&acct, account), None)
        };

        let inner = if repeat { reblog } else { json };

        let subject = json.str_at("spoiler_text");
        let sensitive = json.bool_at("sensitive");

        Self {
            id: json.str_at("id"),
            content: json.str_at("content"),
            content_type: json.str_at("content_type"),
            sensitive,
            visibility: Visibility::from_server(&inner.str_at("visibility")),
            reply_target_id: inner.str_at("id"),
            in_reply_to_id: inner.opt_str_at("in_reply_to_id"),
            language: inner.opt_str_at("language"),
            url: json.opt_str_at("url"),
            created_at: json
                .opt_str_at("created_at")
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            favorited: json.bool_at("favourited"),
            repeated: json.bool_at("reblogged"),
            bookmarked: json.bool_at("bookmarked"),
            pinned: json.bool_at("pinned"),
            replies_count: inner.u64_at("replies_count").unwrap_or(0),
            reblogs_count: inner.u64_at("reblogs_count").unwrap_or(0),
            favourites_count: inner.u64_at("favourites_count").unwrap_or(0),
            repeat,
            author_identity,
            repeat_identity,
            mentions: inner
                .array_at("mentions")
                .iter()
                .map(|m| m.str_at("acct"))
                .collect(),
            attachments: inner
                .array_at("media_attachments")
                .iter()
                .map(Attachment::from_json)
                .collect(),
            attachments_visible: !sensitive,
            expanded: subject.is_empty(),
            subject,
        }
    }

    /// A blank post to compose, authored by `author`
    pub fn draft(author: Arc<Identity>, visibility: Visibility) -> Self {
        Self {
            id: String::new(),
            subject: String::new(),
            content: String::new(),
            content_type: String::new(),
            sensitive: false,
            visibility,
            reply_target_id: String::new(),
            in_reply_to_id: None,
            language: None,
            url: None,
            created_at: None,
            favorited: false,
            repeated: false,
            bookmarked: false,
            pinned: false,
            replies_count: 0,
            reblogs_count: 0,
            favourites_count: 0,
            repeat: false,
            author_identity: author,
            repeat_identity: None,
            mentions: Vec::new(),
            attachments: Vec::new(),
            expanded: true,
            attachments_visible: true,
        }
    }

    /// Body for `POST /api/v1/statuses`
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "spoiler_text": self.subject,
            "status": self.content,
            "content_type": self.content_type,
            "sensitive": self.sensitive,
            "visibility": self.visibility.as_str(),
            "media_ids": self.attachments.iter().map(|a| a.id.clone()).collect::<Vec<_>>(),
        });
        if !self.reply_target_id.is_empty() {
            body["in_reply_to_id"] = Value::String(self.reply_target_id.clone());
        }
        if let Some(language) = &self.language {
            body["language"] = Value::String(language.clone());
        }
        body
    }

    /// Content with HTML tags stripped and entities decoded
    pub fn plain_text(&self) -> String {
        let content = html_escape::decode_html_entities(&self.content)
            .to_string()
            .replace("<br>", "\n")
            .replace("<br/>", "\n")
            .replace("<br />", "\n")
            .replace("</p><p>", "\n\n");

        match HTML_TAG.as_ref() {
            Some(re) => re.replace_all(&content, "").into_owned(),
            None => content,
        }
    }
}
