//! Change notifications
//!
//! Mutating operations on an [`Account`](crate::Account) announce what changed
//! on a broadcast channel. Subscribers (a UI, the CLI, tests) each get every
//! event sent after they subscribed.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::models::{Notification, Post};

const CHANNEL_CAPACITY: usize = 256;

/// Which request produced an instance-metadata update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    /// `/api/v2/instance`
    InstanceV2,
    /// `/api/v1/instance` (fallback)
    InstanceV1,
    /// `/nodeinfo/2.1.json`
    NodeInfo,
}

/// Something observable changed
#[derive(Debug, Clone)]
pub enum Event {
    /// The OAuth application was registered
    Registered,
    /// Token validation finished; `false` means the token was rejected
    Authenticated(bool),
    /// The session's token was cleared
    LoggedOut,
    /// The username changed
    UsernameChanged,
    /// Part of the capability descriptor was updated. Delivered once per
    /// source, in whatever order the requests complete.
    InstanceMetadataFetched(MetadataSource),
    /// The custom emoji table was replaced
    CustomEmojisFetched,
    /// An identity's profile fields were refreshed
    IdentityChanged {
        /// Account handle
        acct: String,
    },
    /// An identity's relationship was replaced
    RelationshipChanged {
        /// Account handle
        acct: String,
    },
    /// Posts for a timeline arrived
    TimelineFetched {
        /// Timeline name (`home`, `public`, ...)
        timeline: String,
        /// Normalized posts, newest first
        posts: Vec<Post>,
    },
    /// An edited post arrived on the stream
    PostUpdated(Post),
    /// A post was deleted server-side
    PostDeleted {
        /// Post identifier
        id: String,
    },
    /// An attachment's preview bytes arrived
    AttachmentPreviewFetched {
        /// Attachment identifier
        attachment_id: String,
    },
    /// An attachment's description was saved
    AttachmentUpdated {
        /// Attachment identifier
        attachment_id: String,
    },
    /// A notification arrived
    Notification(Arc<Notification>),
    /// Server-side posting/reading preferences were fetched
    PreferencesChanged,
    /// Pending follow requests appeared or were cleared
    FollowRequestsChanged(bool),
    /// User-facing error message
    Error(String),
    /// Account creation failed; carries the server's raw body
    RegistrationError(String),
}

/// Fan-out channel for [`Event`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus with the default capacity
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event dropped: no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
