//! Authentication: OAuth flows and persisted account settings

pub mod oauth;
pub mod store;

pub use oauth::{OAuthApp, SessionState};
pub use store::{AccountSettings, EncryptedFileStore, MemoryStore, SettingsStore, settings_group_name};
