//! Execution session
//!
//! One live attachment to a running container's combined
//! stdin/stdout/stderr stream. A background reader drains the stream
//! into an unbounded, ordered line queue; the caller writes commands
//! and consumes lines from a single task.
//!
//! State machine: `Unattached -> Attached -> Closed`. Once closed a
//! session never reattaches; create a new one instead.

mod lines;
mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use lines::LineDecoder;
pub use transport::{Connector, LineSink, MessageStream, WebSocketConnector, attach_url};

use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Which wall-clock limit expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No output arrived for too long
    NoResponse,
    /// The command as a whole ran too long
    Command,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::NoResponse => write!(f, "no-response timeout"),
            TimeoutKind::Command => write!(f, "command timeout"),
        }
    }
}

/// Errors raised by the session and the command protocol on top of it
#[derive(Debug, Error)]
pub enum SessionError {
    /// Send or receive before `attach`
    #[error("Session is not attached")]
    NotAttached,

    /// The stream ended or a previous failure closed the session
    #[error("Session is closed")]
    Closed,

    /// Opening the attach stream failed
    #[error("Failed to attach to {url}: {message}")]
    Attach { url: String, message: String },

    /// Reading or writing the stream failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The container answered with something the protocol cannot interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A wall-clock limit expired while waiting for the container
    #[error("{kind} expired after {after:?}")]
    Timeout { kind: TimeoutKind, after: Duration },

    /// The container host address has no streaming counterpart
    #[error("Unsupported container host endpoint: {0}")]
    UnsupportedEndpoint(String),
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unattached,
    Attached,
    Closed,
}

type LineResult = Result<String, SessionError>;

/// Live attachment to one container
pub struct Session {
    url: String,
    connector: Arc<dyn Connector>,
    state: SessionState,
    sink: Option<LineSink>,
    lines: Option<mpsc::UnboundedReceiver<LineResult>>,
    reader: Option<JoinHandle<()>>,
    activity: Option<watch::Receiver<Instant>>,
}

impl Session {
    /// Creates an unattached session for a container behind `docker_host`
    pub fn new(docker_host: &str, container_id: &str) -> Result<Self, SessionError> {
        let url = attach_url(docker_host, container_id)?;
        Ok(Self::with_connector(url, Arc::new(WebSocketConnector)))
    }

    /// Creates an unattached session using a custom connector
    pub fn with_connector(url: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            url: url.into(),
            connector,
            state: SessionState::Unattached,
            sink: None,
            lines: None,
            reader: None,
            activity: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Opens the stream and starts the background reader
    ///
    /// Attaching an already attached session is a no-op.
    pub async fn attach(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Attached => {
                debug!("Session already attached to {}", self.url);
                return Ok(());
            }
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Unattached => {}
        }

        let (sink, stream) = self.connector.connect(&self.url).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (activity_tx, activity_rx) = watch::channel(Instant::now());

        self.reader = Some(tokio::spawn(read_lines(stream, tx, activity_tx)));
        self.sink = Some(sink);
        self.lines = Some(rx);
        self.activity = Some(activity_rx);
        self.state = SessionState::Attached;

        info!("Attached to {}", self.url);
        Ok(())
    }

    /// Writes each command as one newline-terminated line, in order
    pub async fn send<I, S>(&mut self, commands: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_attached()?;
        let sink = self.sink.as_mut().ok_or(SessionError::NotAttached)?;

        let result = write_all(sink, commands).await;
        if let Err(e) = &result {
            warn!("Write to {} failed: {}", self.url, e);
            self.close();
        }
        result
    }

    /// Waits for the next line from the container.
    ///
    /// Lines are returned in exactly the order the reader received them.
    /// Once the stream ends or fails the session is closed and every
    /// further call returns an error.
    pub async fn recv_line(&mut self) -> Result<String, SessionError> {
        self.ensure_attached()?;
        let lines = self.lines.as_mut().ok_or(SessionError::NotAttached)?;

        match lines.recv().await {
            Some(Ok(line)) => Ok(line),
            Some(Err(e)) => {
                self.close();
                Err(e)
            }
            None => {
                debug!("Attach stream to {} ended", self.url);
                self.close();
                Err(SessionError::Closed)
            }
        }
    }

    /// Stops the reader and drops the stream
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.sink = None;
        self.lines = None;
        self.activity = None;
        self.state = SessionState::Closed;
        debug!("Session to {} closed", self.url);
    }

    /// When the reader last received anything, complete line or not.
    ///
    /// `None` unless attached.
    pub fn last_activity(&self) -> Option<Instant> {
        self.activity.as_ref().map(|rx| *rx.borrow())
    }

    fn ensure_attached(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Attached => Ok(()),
            SessionState::Unattached => Err(SessionError::NotAttached),
            SessionState::Closed => Err(SessionError::Closed),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn write_all<I, S>(sink: &mut LineSink, commands: I) -> Result<(), SessionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for command in commands {
        let command = command.as_ref();
        debug!("send: {}", command);
        sink.send(format!("{}\n", command)).await?;
    }
    Ok(())
}

/// Background reader: drains the stream into the line queue until it
/// ends, fails, or the session drops the receiving side. Every chunk
/// bumps the activity clock, even one without a newline.
async fn read_lines(
    mut stream: MessageStream,
    tx: mpsc::UnboundedSender<LineResult>,
    activity: watch::Sender<Instant>,
) {
    let mut decoder = LineDecoder::new();

    while let Some(message) = stream.next().await {
        match message {
            Ok(chunk) => {
                activity.send_replace(Instant::now());
                for line in decoder.push(&chunk) {
                    debug!("recv: {}", line);
                    if tx.send(Ok(line)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("Attach stream failed: {}", e);
                if let Some(rest) = decoder.finish() {
                    let _ = tx.send(Ok(rest));
                }
                let _ = tx.send(Err(e));
                return;
            }
        }
    }

    if let Some(rest) = decoder.finish() {
        debug!("recv: {}", rest);
        let _ = tx.send(Ok(rest));
    }
}
