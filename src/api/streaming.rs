//! Streaming API over WebSocket

use std::ops::ControlFlow;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::error::Result;
use crate::json::JsonExt;

/// One event from the streaming API
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A new status (JSON)
    Update(Value),
    /// A new notification (JSON)
    Notification(Value),
    /// A status was deleted
    Delete(String),
    /// A status was edited (JSON)
    StatusUpdate(Value),
    /// An event this client does not handle
    Other(String),
}

impl StreamEvent {
    /// Parse a text frame: `{"event": ..., "payload": ...}`.
    ///
    /// Payloads arrive as JSON encoded inside a string. Returns `None` for
    /// frames that are not events at all.
    pub fn parse_frame(text: &str) -> Option<Self> {
        let frame: Value = serde_json::from_str(text).ok()?;
        let event = frame.opt_str_at("event")?;
        let payload = frame.str_at("payload");

        let decode = || serde_json::from_str::<Value>(&payload).ok();

        Some(match event.as_str() {
            "update" => Self::Update(decode()?),
            "notification" => Self::Notification(decode()?),
            "status.update" => Self::StatusUpdate(decode()?),
            "delete" => Self::Delete(payload),
            _ => Self::Other(event),
        })
    }
}

/// A running stream. Dropping it closes the connection.
#[derive(Debug)]
pub struct StreamHandle {
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Whether the stream has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the stream ends on its own
    pub async fn join(mut self) {
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                tracing::error!("stream task failed: {e}");
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connect to `url` and feed every event to `handler` until the server
/// closes the connection or `handler` breaks.
///
/// The connection is made inside the spawned task; a failure to connect is
/// logged and ends the stream.
pub fn spawn<F>(url: Url, mut handler: F) -> StreamHandle
where
    F: FnMut(StreamEvent) -> ControlFlow<()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        if let Err(e) = run(&url, &mut handler).await {
            tracing::warn!("stream {} ended: {e}", url.path());
        }
    });
    StreamHandle { task }
}

async fn run<F>(url: &Url, handler: &mut F) -> Result<()>
where
    F: FnMut(StreamEvent) -> ControlFlow<()>,
{
    let (mut socket, _) = connect_async(url.as_str()).await?;
    tracing::info!("stream connected to {}", url.host_str().unwrap_or_default());

    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => {
                let Some(event) = StreamEvent::parse_frame(text.as_str()) else {
                    tracing::debug!("ignoring malformed stream frame");
                    continue;
                };
                if handler(event).is_break() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!("stream closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_update() {
        let frame = json!({
            "stream": ["user"],
            "event": "update",
            "payload": json!({"id": "1", "content": "hi"}).to_string()
        });
        let event = StreamEvent::parse_frame(&frame.to_string()).unwrap();
        assert_eq!(event, StreamEvent::Update(json!({"id": "1", "content": "hi"})));
    }

    #[test]
    fn test_parse_delete() {
        let frame = r#"{"event":"delete","payload":"109"}"#;
        assert_eq!(
            StreamEvent::parse_frame(frame),
            Some(StreamEvent::Delete("109".to_string()))
        );
    }

    #[test]
    fn test_parse_unknown_and_garbage() {
        assert_eq!(
            StreamEvent::parse_frame(r#"{"event":"filters_changed"}"#),
            Some(StreamEvent::Other("filters_changed".to_string()))
        );
        assert_eq!(StreamEvent::parse_frame("not json"), None);
        assert_eq!(StreamEvent::parse_frame(r#"{"event":"update","payload":"{"}"#), None);
    }
}
