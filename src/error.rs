//! Error types for Roost
//!
//! Every fallible library operation returns [`Result`]. Nothing in the core is
//! fatal: callers turn these into a user-visible notice or drop them.

use thiserror::Error;

use crate::actions::AccountAction;

/// Library-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client core
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced an HTTP response (DNS, TLS, connection reset)
    #[error("Network error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message taken from the `error` envelope, or the raw body
        message: String,
        /// Raw response body
        body: String,
    },

    /// A response body could not be decoded into the expected shape
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL could not be built from the instance URI
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// An OAuth step was attempted before the application was registered
    #[error("Application is not registered with {0}")]
    NotRegistered(String),

    /// An OAuth exchange returned no usable token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Account creation was rejected; carries the server's raw body
    #[error("Registration failed: {0}")]
    Registration(String),

    /// A relationship mutation failed
    #[error("{message}")]
    Action {
        /// The action that was attempted
        action: AccountAction,
        /// User-facing message for the action
        message: String,
        /// Detail reported by the server, if any
        server: String,
    },

    /// A timeline name that maps to no endpoint
    #[error("Unknown timeline: {0}")]
    UnknownTimeline(String),

    /// Reading or writing persisted credentials failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The streaming connection failed
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// Filesystem error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status code, if the server answered at all
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected our credentials
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Streaming(err.to_string())
    }
}
