//! Configuration module for Roost

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::NotificationType;
use crate::paths;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Application name sent when registering with an instance
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Application website sent when registering
    #[serde(default = "default_website")]
    pub website: String,

    /// OAuth redirect URI (out-of-band by default: the user pastes the code)
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Scopes requested on top of `read write follow`, space separated
    #[serde(default)]
    pub additional_scopes: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Accept invalid TLS certificates (self-hosted test instances)
    #[serde(default)]
    pub ignore_ssl_errors: bool,

    /// User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Number of posts to fetch per timeline request
    #[serde(default = "default_timeline_limit")]
    pub timeline_limit: usize,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Which notifications are delivered to the desktop
    #[serde(default)]
    pub notifications: NotificationPreferences,
}

fn default_client_name() -> String {
    "Roost".to_string()
}

fn default_website() -> String {
    env!("CARGO_PKG_REPOSITORY").to_string()
}

fn default_redirect_uri() -> String {
    "urn:ietf:wg:oauth:2.0:oob".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("roost/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_timeline_limit() -> usize {
    20
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            website: default_website(),
            redirect_uri: default_redirect_uri(),
            additional_scopes: String::new(),
            request_timeout_secs: default_request_timeout(),
            ignore_ssl_errors: false,
            user_agent: default_user_agent(),
            timeline_limit: default_timeline_limit(),
            log_filter: default_log_filter(),
            notifications: NotificationPreferences::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(paths::config_path()?)
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Per-type desktop notification toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct NotificationPreferences {
    /// Mentions
    pub mention: bool,
    /// New posts from accounts we get notified about
    pub status: bool,
    /// Boosts of our posts
    pub repeat: bool,
    /// New followers
    pub follow: bool,
    /// Follow requests
    pub follow_request: bool,
    /// Favourites of our posts
    pub favorite: bool,
    /// Ended polls
    pub poll: bool,
    /// Edits of posts we interacted with
    pub update: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            mention: true,
            status: true,
            repeat: true,
            follow: true,
            follow_request: true,
            favorite: true,
            poll: true,
            update: true,
        }
    }
}

impl NotificationPreferences {
    /// Whether a notification of `kind` should be shown.
    /// Unknown kinds are never shown.
    pub const fn allows(&self, kind: NotificationType) -> bool {
        match kind {
            NotificationType::Mention => self.mention,
            NotificationType::Status => self.status,
            NotificationType::Repeat => self.repeat,
            NotificationType::Follow => self.follow,
            NotificationType::FollowRequest => self.follow_request,
            NotificationType::Favorite => self.favorite,
            NotificationType::Poll => self.poll,
            NotificationType::Update => self.update,
            NotificationType::Unknown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.redirect_uri, "urn:ietf:wg:oauth:2.0:oob");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.client_name = "Test".into();
        config.notifications.favorite = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timeline_limit = 40\n[notifications]\npoll = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.timeline_limit, 40);
        assert_eq!(config.client_name, "Roost");
        assert!(!config.notifications.poll);
        assert!(config.notifications.mention);
    }

    #[test]
    fn test_allows() {
        let prefs = NotificationPreferences {
            favorite: false,
            ..Default::default()
        };
        assert!(prefs.allows(NotificationType::Mention));
        assert!(!prefs.allows(NotificationType::Favorite));
        assert!(!prefs.allows(NotificationType::Unknown));
    }
}
