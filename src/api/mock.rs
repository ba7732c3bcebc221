//! In-memory transport for tests.
//!
//! Routes are keyed by method and URL path (host and query are ignored).
//! Each route holds a queue of responses: every request pops the front one,
//! except the last, which keeps being served. Unrouted requests get a 404.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Method, Request, Response, Transport};
use crate::error::{Error, Result};
use crate::lock::lock;

#[derive(Debug, Default)]
struct Route {
    responses: VecDeque<Result<Response>>,
    delay: Option<Duration>,
}

/// Transport that serves canned responses and records every request
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), Route>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Create an empty mock; every request answers 404 until routed
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, response: Result<Response>) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .responses
            .push_back(response);
        self
    }

    /// Queue a raw response for `method path`
    pub fn on(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.push(method, path, Ok(Response::new(status, body)))
    }

    /// Queue a JSON response for `method path`
    pub fn on_json(&self, method: Method, path: &str, status: u16, body: &Value) -> &Self {
        self.push(method, path, Ok(Response::new(status, body.to_string())))
    }

    /// Queue a connection-level failure for `method path`
    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, Err(Error::Transport(message.to_string())))
    }

    /// Delay every response on `method path`
    pub fn delay(&self, method: Method, path: &str, delay: Duration) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .delay = Some(delay);
        self
    }

    /// All requests seen so far, in order of arrival
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    /// Requests whose URL path equals `path`
    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url.path() == path)
            .cloned()
            .collect()
    }

    /// Number of requests made to `path`
    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    fn next_response(&self, method: Method, path: &str) -> (Option<Duration>, Result<Response>) {
        let mut routes = lock(&self.routes);
        let Some(route) = routes.get_mut(&(method, path.to_string())) else {
            return (None, Ok(not_found()));
        };

        let response = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().map(clone_result)
        };

        (route.delay, response.unwrap_or_else(|| Ok(not_found())))
    }
}

fn not_found() -> Response {
    Response::new(404, r#"{"error":"Record not found"}"#)
}

fn clone_result(result: &Result<Response>) -> Result<Response> {
    match result {
        Ok(response) => Ok(response.clone()),
        Err(e) => Err(Error::Transport(e.to_string())),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        let method = request.method;
        let path = request.url.path().to_string();
        lock(&self.requests).push(request);

        let (delay, response) = self.next_response(method, &path);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        tracing::trace!("mock {method} {path} -> {:?}", response.as_ref().map(|r| r.status));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(path: &str) -> Request {
        let url = Url::parse("https://example.social").unwrap().join(path).unwrap();
        Request::new(Method::Get, url)
    }

    #[tokio::test]
    async fn test_queue_then_repeat_last() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/a", 200, "first")
            .on(Method::Get, "/a", 200, "second");

        assert_eq!(mock.execute(get("/a")).await.unwrap().text(), "first");
        assert_eq!(mock.execute(get("/a")).await.unwrap().text(), "second");
        assert_eq!(mock.execute(get("/a")).await.unwrap().text(), "second");
        assert_eq!(mock.count("/a"), 3);
    }

    #[test]
    fn test_unrouted_is_404() {
        let mock = MockTransport::new();
        let response = tokio_test::block_on(mock.execute(get("/nowhere"))).unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_query_is_ignored_for_routing() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/api/v1/timelines/home", 200, "[]");
        let response = mock
            .execute(get("/api/v1/timelines/home?max_id=5"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_fail() {
        let mock = MockTransport::new();
        mock.fail(Method::Get, "/down", "connection refused");
        let err = mock.execute(get("/down")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
