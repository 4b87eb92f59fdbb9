//! Attach transport
//!
//! A [`Connector`] opens the bidirectional stream to a container and
//! hands back a line sink (stdin) and a message stream (stdout+stderr).
//! Production uses the container host's WebSocket attach endpoint.

use async_trait::async_trait;
use futures::future;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::{self, Message};

use super::SessionError;

/// Write half: each item is sent as one message
pub type LineSink = Pin<Box<dyn Sink<String, Error = SessionError> + Send>>;

/// Read half: raw text messages in arrival order
pub type MessageStream = BoxStream<'static, Result<String, SessionError>>;

/// Opens attach streams
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `url` and returns the write and read halves
    async fn connect(&self, url: &str) -> Result<(LineSink, MessageStream), SessionError>;
}

/// Builds the attach URL for a container.
///
/// The API scheme of `docker_host` is swapped for its streaming
/// counterpart: `tcp://` and `http://` become `ws://`, `https://`
/// becomes `wss://`.
///
/// # Example
/// ```ignore
/// let url = attach_url("tcp://127.0.0.1:2375", "abc123")?;
/// assert_eq!(
///     url,
///     "ws://127.0.0.1:2375/containers/abc123/attach/ws?stdin=1&stderr=1&stdout=1&stream=1"
/// );
/// ```
pub fn attach_url(docker_host: &str, container_id: &str) -> Result<String, SessionError> {
    let host = docker_host.trim_end_matches('/');

    let endpoint = if let Some(rest) = host
        .strip_prefix("tcp://")
        .or_else(|| host.strip_prefix("http://"))
    {
        format!("ws://{}", rest)
    } else if let Some(rest) = host.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if host.starts_with("ws://") || host.starts_with("wss://") {
        host.to_string()
    } else {
        return Err(SessionError::UnsupportedEndpoint(docker_host.to_string()));
    };

    if container_id.is_empty() {
        return Err(SessionError::UnsupportedEndpoint(format!(
            "{} (empty container id)",
            docker_host
        )));
    }

    Ok(format!(
        "{}/containers/{}/attach/ws?stdin=1&stderr=1&stdout=1&stream=1",
        endpoint, container_id
    ))
}

/// Connector for the container host's WebSocket attach endpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<(LineSink, MessageStream), SessionError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SessionError::Attach {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let (write, read) = socket.split();

        let sink = write
            .sink_map_err(|e| SessionError::Transport(e.to_string()))
            .with(|line: String| future::ready(Ok::<_, SessionError>(Message::Text(line))));

        let stream = read
            .take_while(|message| {
                future::ready(!matches!(
                    message,
                    Ok(Message::Close(_)) | Err(tungstenite::Error::ConnectionClosed)
                ))
            })
            .filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(data)) => {
                        Some(Ok(String::from_utf8_lossy(&data).into_owned()))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(SessionError::Transport(e.to_string()))),
                })
            });

        Ok((Box::pin(sink), stream.boxed()))
    }
}
