//! # Roost 🪺
//!
//! Client core for Mastodon-compatible servers (Mastodon, Pleroma, Akkoma,
//! glitch-soc).
//!
//! ## Overview
//!
//! Roost is everything a fediverse client needs below its user interface:
//! OAuth registration and login, instance capability discovery, timelines,
//! posting, notifications, relationship actions, the streaming API and
//! persisted multi-account settings. A UI (or the bundled `roost` CLI)
//! drives an [`Account`] and listens to its [`EventBus`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     AccountRegistry                         │
//! │     Logged-in accounts, selection, persisted settings       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Account                             │
//! │  OAuth • capabilities • timelines • actions • streaming     │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │       API       │ │  IdentityCache  │ │    EventBus     │
//! │                 │ │                 │ │                 │
//! │ • Transport     │ │ • One Identity  │ │ • Broadcast     │
//! │ • Gateway       │ │   per handle    │ │   change events │
//! │ • Streaming     │ │                 │ │                 │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`account`] — The session object and every server operation
//! - [`actions`] — Relationship actions and their endpoints
//! - [`api`] — Transport seam, request gateway, streaming
//! - [`auth`] — OAuth helpers and encrypted settings storage
//! - [`cache`] — Identity canonicalization
//! - [`config`] — Configuration management
//! - [`events`] — Change notifications
//! - [`instance`] — Server capability descriptor
//! - [`models`] — Identities, posts, notifications, emojis, preferences
//! - [`registry`] — Multi-account registry
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use roost::api::HttpTransport;
//! use roost::{Account, Config};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let transport = Arc::new(HttpTransport::from_config(&config)?);
//! let account = Account::with_config("mastodon.social", transport, config)?;
//!
//! account.register_application("Roost", "", "").await?;
//! println!("Open {}", account.authorize_url()?);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/roost/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::single_match_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::use_self)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::similar_names)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::too_many_arguments)]

pub mod account;
pub mod actions;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod instance;
pub(crate) mod json;
pub(crate) mod lock;
pub mod models;
pub mod paths;
pub mod registry;

// Re-export main types for convenience
pub use account::{Account, AccountAction};
pub use cache::IdentityCache;
pub use config::Config;
pub use error::{Error, Result};
pub use events::{Event, EventBus, MetadataSource};
pub use instance::{Capabilities, ContentTypes};
pub use models::{Identity, Notification, NotificationType, Post, Preferences, Relationship, Visibility};
pub use registry::AccountRegistry;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Repository URL
pub const REPO_URL: &str = "https://github.com/roost-social/roost";
