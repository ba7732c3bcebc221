//! HTTP request gateway
//!
//! All traffic to the home server goes through a [`Transport`]. The live
//! implementation is [`HttpTransport`] (reqwest); [`MockTransport`] serves
//! canned responses for tests. [`Gateway`] sits on top and turns non-2xx
//! responses into [`Error::Status`](crate::Error::Status).

pub mod gateway;
pub mod http;
pub mod mock;
pub mod streaming;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::json::JsonExt;

pub use gateway::Gateway;
pub use http::HttpTransport;
pub use mock::MockTransport;
pub use streaming::{StreamEvent, StreamHandle};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file sent as `multipart/form-data`
#[derive(Debug, Clone)]
pub struct MultipartFile {
    /// File name reported to the server
    pub file_name: String,
    /// MIME type of the payload
    pub mime: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
    /// Additional text parts (e.g. `description`)
    pub fields: Vec<(String, String)>,
}

/// Request body
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body
    #[default]
    Empty,
    /// `application/json`
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `multipart/form-data` with a single `file` part
    Multipart(MultipartFile),
}

/// An outgoing request
#[derive(Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: Url,
    /// Bearer token for the `Authorization` header
    pub bearer: Option<String>,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// Body
    pub body: Body,
}

impl Request {
    /// Create a request with no body and no credentials
    pub const fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            bearer: None,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Attach a bearer token
    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    /// Add a header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Whether an `Authorization` header will be sent
    pub const fn is_authenticated(&self) -> bool {
        self.bearer.is_some()
    }

    /// JSON body, if any
    pub const fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a form field, if the body is a form
    pub fn form_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            Body::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}

/// A response from the server, whatever its status
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Raw body
    pub body: Vec<u8>,
}

impl Response {
    /// Build a response from a status and body
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as (lossy) UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body as JSON; `null` when the body is not valid JSON
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// Message from the standard `{"error": ..., "error_description": ...}`
    /// envelope, falling back to the raw body
    pub fn error_message(&self) -> String {
        let json = self.json();
        match (json.opt_str_at("error"), json.opt_str_at("error_description")) {
            (Some(error), Some(description)) => format!("{error}: {description}"),
            (Some(error), None) => error,
            (None, Some(description)) => description,
            (None, None) => self.text(),
        }
    }

    /// Turn a non-2xx response into [`Error::Status`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Status {
                status: self.status,
                message: self.error_message(),
                body: self.text(),
            })
        }
    }
}

/// The transport capability: something that can execute a request.
///
/// Implemented by [`HttpTransport`] for live servers and [`MockTransport`]
/// for tests. Connection-level failures are `Err`; any HTTP status, even an
/// error status, is `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a single request
    async fn execute(&self, request: Request) -> Result<Response>;
}
