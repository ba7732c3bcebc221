//! Data models for Roost

mod emoji;
mod identity;
mod notification;
mod post;
mod preferences;
mod relationship;

pub use emoji::CustomEmoji;
pub use identity::{Field, Identity, IdentityData};
pub use notification::{Notification, NotificationType};
pub use post::{Attachment, AttachmentType, Post, UnknownVisibility, Visibility};
pub use preferences::{MediaExpansion, Preferences};
pub use relationship::Relationship;
