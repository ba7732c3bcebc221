//! Request gateway: URL building, bearer attachment and status mapping

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use super::{Body, Method, MultipartFile, Request, Response, Transport};
use crate::error::Result;

/// Build an API URL on an instance.
///
/// The instance may be given as a bare host (`mastodon.social`) or a full
/// URL; the scheme is always forced to `https` and the path replaced.
pub fn api_url(instance_uri: &str, path: &str) -> Result<Url> {
    let mut url = instance_url(instance_uri)?;
    url.set_path(path);
    url.set_query(None);
    Ok(url)
}

/// Normalise a user-supplied instance to an `https` origin
pub fn instance_url(instance_uri: &str) -> Result<Url> {
    let trimmed = instance_uri.trim().trim_end_matches('/');
    let host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    Ok(Url::parse(&format!("https://{host}"))?)
}

/// Thin layer over a [`Transport`] that every API call goes through
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
}

impl Gateway {
    /// Wrap a transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// The underlying transport
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Send a request and return the response whatever its status
    pub async fn send_raw(&self, request: Request) -> Result<Response> {
        let method = request.method;
        let url = request.url.clone();
        tracing::debug!(
            "{method} {} (authenticated: {})",
            url.path(),
            request.is_authenticated()
        );

        match self.transport.execute(request).await {
            Ok(response) => {
                tracing::debug!("{method} {} -> {}", url.path(), response.status);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!("{method} {} failed: {e}", url.path());
                Err(e)
            }
        }
    }

    /// Send a request; non-2xx responses become [`Error::Status`](crate::Error::Status)
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_raw(request).await?.error_for_status()
    }

    /// GET
    pub async fn get(&self, url: Url, bearer: Option<String>) -> Result<Response> {
        self.send(Request::new(Method::Get, url).bearer(bearer)).await
    }

    /// POST with a JSON body
    pub async fn post_json(&self, url: Url, body: Value, bearer: Option<String>) -> Result<Response> {
        self.send(
            Request::new(Method::Post, url)
                .bearer(bearer)
                .body(Body::Json(body)),
        )
        .await
    }

    /// POST with a form body
    pub async fn post_form(
        &self,
        url: Url,
        form: Vec<(String, String)>,
        bearer: Option<String>,
    ) -> Result<Response> {
        self.send(
            Request::new(Method::Post, url)
                .bearer(bearer)
                .body(Body::Form(form)),
        )
        .await
    }

    /// PUT with a JSON body
    pub async fn put_json(&self, url: Url, body: Value, bearer: Option<String>) -> Result<Response> {
        self.send(
            Request::new(Method::Put, url)
                .bearer(bearer)
                .body(Body::Json(body)),
        )
        .await
    }

    /// PATCH with a JSON body
    pub async fn patch_json(&self, url: Url, body: Value, bearer: Option<String>) -> Result<Response> {
        self.send(
            Request::new(Method::Patch, url)
                .bearer(bearer)
                .body(Body::Json(body)),
        )
        .await
    }

    /// DELETE
    pub async fn delete(&self, url: Url, bearer: Option<String>) -> Result<Response> {
        self.send(Request::new(Method::Delete, url).bearer(bearer))
            .await
    }

    /// POST a file as `multipart/form-data`
    pub async fn upload(&self, url: Url, file: MultipartFile, bearer: Option<String>) -> Result<Response> {
        self.send(
            Request::new(Method::Post, url)
                .bearer(bearer)
                .body(Body::Multipart(file)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTransport;

    #[test]
    fn test_api_url_forces_https() {
        let url = api_url("mastodon.social", "/api/v1/apps").unwrap();
        assert_eq!(url.as_str(), "https://mastodon.social/api/v1/apps");

        let url = api_url("http://pleroma.example/", "/nodeinfo/2.1.json").unwrap();
        assert_eq!(url.as_str(), "https://pleroma.example/nodeinfo/2.1.json");
    }

    #[tokio::test]
    async fn test_send_maps_status() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Get, "/api/v1/accounts/verify_credentials", 401, r#"{"error":"invalid token"}"#);
        let gateway = Gateway::new(mock.clone());

        let url = api_url("example.social", "/api/v1/accounts/verify_credentials").unwrap();
        let err = gateway.get(url.clone(), None).await.unwrap_err();
        assert_eq!(err.status(), Some(401));

        let raw = gateway
            .send_raw(Request::new(Method::Get, url))
            .await
            .unwrap();
        assert_eq!(raw.status, 401);
    }

    #[tokio::test]
    async fn test_bearer_forwarded() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Delete, "/api/v1/statuses/9", 200, "{}");
        let gateway = Gateway::new(mock.clone());

        let url = api_url("example.social", "/api/v1/statuses/9").unwrap();
        gateway.delete(url, Some("tok".to_string())).await.unwrap();

        let sent = mock.requests_to("/api/v1/statuses/9");
        assert_eq!(sent[0].bearer.as_deref(), Some("tok"));
    }
}
