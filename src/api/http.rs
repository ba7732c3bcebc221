//! Live transport backed by reqwest

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};

use super::{Body, Method, Request, Response, Transport};
use crate::config::Config;
use crate::error::Result;

/// Transport that talks to real servers
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with reqwest defaults
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a transport honoring the timeout, user agent and TLS settings
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());

        let timeout = config.request_timeout();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        if config.ignore_ssl_errors {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

const fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(to_reqwest(request.method), request.url.clone());

        if let Some(token) = &request.bearer {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Form(pairs) => builder.form(&pairs),
            Body::Multipart(file) => {
                let part = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime)?;
                let mut form = Form::new().part("file", part);
                for (name, value) in file.fields {
                    form = form.text(name, value);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_accepts_disabled_timeout() {
        let config = Config {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.request_timeout().is_zero());
        assert!(HttpTransport::from_config(&config).is_ok());
        assert!(HttpTransport::from_config(&Config::default()).is_ok());
    }
}
