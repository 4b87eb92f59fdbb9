//! Command runner
//!
//! Runs a batch of shell commands through a [`Session`] and recovers
//! the exit status. The attach stream has no framing of its own, so
//! after the batch the runner sends `echo <token> $?` and reads lines
//! until one starts with the token; the number after it is the status
//! of the last command the shell ran.
//!
//! This only works if the container shell executes the batch and the
//! sentinel strictly in the order they were written, one at a time.
//! The runner relies on that and does not check it.
//!
//! Known weakness: a command that prints the token at the start of a
//! line ends the read early. Tokens are random UUIDs, so this needs the
//! output to know the token in advance.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::session::{Session, SessionError, TimeoutKind};

/// Wall-clock limits for one command batch; `None` waits forever
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit for the whole batch
    pub command: Option<Duration>,
    /// Limit on silence: any output resets it, even a partial line
    pub no_response: Option<Duration>,
}

/// Result of a batch that reached its sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status of the last command in the batch
    pub exit_code: i32,
    /// Lines printed by the batch, in arrival order
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A batch that never produced a usable sentinel.
///
/// Carries whatever output arrived before the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct CommandError {
    #[source]
    pub error: SessionError,
    pub output: Vec<String>,
}

impl CommandError {
    fn new(error: SessionError, output: Vec<String>) -> Self {
        Self { error, output }
    }
}

/// Generates a fresh completion token
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

/// Matches a sentinel line for `token`.
///
/// Returns `None` for ordinary output, the parsed status for a valid
/// sentinel, and a protocol error when the status is malformed.
pub fn parse_sentinel(token: &str, line: &str) -> Option<Result<i32, SessionError>> {
    let status = line.strip_prefix(token)?.trim();
    Some(status.parse::<i32>().map_err(|_| {
        SessionError::Protocol(format!("malformed exit status in sentinel line {:?}", line))
    }))
}

/// Executes command batches on one attached session.
///
/// At most one batch is in flight at a time; `run` takes `&mut self`.
pub struct CommandRunner {
    session: Session,
    timeouts: Timeouts,
}

impl CommandRunner {
    pub fn new(session: Session, timeouts: Timeouts) -> Self {
        Self { session, timeouts }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Closes the underlying session
    pub fn close(&mut self) {
        self.session.close();
    }

    /// Runs `commands` and waits for their sentinel.
    ///
    /// A timeout closes the session: whatever the container was doing is
    /// unknown afterwards, so nothing else may run on it.
    pub async fn run<I, S>(&mut self, commands: I) -> Result<CommandOutput, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let token = new_token();

        self.session
            .send(commands)
            .await
            .map_err(|e| CommandError::new(e, Vec::new()))?;
        self.session
            .send([format!("echo {} $?", token)])
            .await
            .map_err(|e| CommandError::new(e, Vec::new()))?;

        let started = Instant::now();
        let deadline = self
            .timeouts
            .command
            .and_then(|limit| started.checked_add(limit));
        let mut lines = Vec::new();

        loop {
            let line = match self.next_line(started, deadline).await {
                Ok(line) => line,
                Err(e) => {
                    if matches!(e, SessionError::Timeout { .. }) {
                        warn!("Closing session after {}", e);
                        self.session.close();
                    }
                    return Err(CommandError::new(e, lines));
                }
            };

            match parse_sentinel(&token, &line) {
                Some(Ok(exit_code)) => {
                    debug!("Batch finished with status {}", exit_code);
                    return Ok(CommandOutput { exit_code, lines });
                }
                Some(Err(e)) => return Err(CommandError::new(e, lines)),
                None => lines.push(line),
            }
        }
    }

    async fn next_line(
        &mut self,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<String, SessionError> {
        loop {
            let idle_since = self
                .session
                .last_activity()
                .map_or(started, |seen| seen.max(started));

            let idle = self
                .timeouts
                .no_response
                .and_then(|limit| idle_since.checked_add(limit))
                .map(|at| (at, TimeoutKind::NoResponse));
            let overall = deadline.map(|at| (at, TimeoutKind::Command));

            let wait = match (idle, overall) {
                (Some(idle), Some(overall)) if overall.0 <= idle.0 => Some(overall),
                (Some(idle), _) => Some(idle),
                (None, overall) => overall,
            };

            let Some((at, kind)) = wait else {
                return self.session.recv_line().await;
            };

            match tokio::time::timeout_at(at, self.session.recv_line()).await {
                Ok(line) => return line,
                Err(_) => {
                    // Output without a newline still counts as a response
                    let active = self
                        .session
                        .last_activity()
                        .is_some_and(|seen| seen > idle_since);
                    if kind == TimeoutKind::NoResponse && active {
                        continue;
                    }

                    let after = match kind {
                        TimeoutKind::NoResponse => self.timeouts.no_response,
                        TimeoutKind::Command => self.timeouts.command,
                    };
                    return Err(SessionError::Timeout {
                        kind,
                        after: after.unwrap_or_default(),
                    });
                }
            }
        }
    }
}
