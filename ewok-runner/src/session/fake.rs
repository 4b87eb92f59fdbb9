//! Scripted in-memory shell for tests
//!
//! Speaks the same [`Connector`] interface as the WebSocket transport
//! and interprets a tiny command language:
//!
//! - `true`, `false`, `exit-with N`, `set ...`: set `$?`
//! - `echo TEXT`: prints TEXT with `$?` expanded
//! - `cd DIR`: fails when DIR contains `missing`
//! - `(` / `)`: subshell group; after a failure inside a group the
//!   remaining commands are skipped and `)` reports the failing status
//! - `tick N MS`: prints N dots, one every MS milliseconds, then a newline
//! - `hang`: stops answering
//! - `disconnect`: ends the stream
//! - `transport-error`: fails the stream
//! - `break-status`: `$?` expands to garbage from now on
//!
//! Unknown commands print `sh: CMD: not found` and exit 127.

use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{Connector, LineSink, MessageStream, SessionError};

type Output = mpsc::UnboundedSender<Result<String, SessionError>>;

#[derive(Debug, Default, Clone)]
pub(crate) struct FakeShell {
    chunk_size: Option<usize>,
}

impl FakeShell {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Delivers output in pieces of `size` characters instead of whole lines
    pub(crate) fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }
}

#[async_trait]
impl Connector for FakeShell {
    async fn connect(&self, _url: &str) -> Result<(LineSink, MessageStream), SessionError> {
        let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_shell(input_rx, output_tx, self.chunk_size));

        let sink = futures::sink::unfold(input_tx, |tx, line: String| async move {
            tx.send(line).map_err(|_| SessionError::Closed)?;
            Ok::<_, SessionError>(tx)
        });
        let stream = futures::stream::unfold(output_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok((Box::pin(sink), stream.boxed()))
    }
}

enum Effect {
    Silent,
    Print(String),
    Ticks { count: usize, interval: Duration },
    Hang,
    Disconnect,
    TransportError,
}

#[derive(Default)]
struct ShellState {
    last_status: i32,
    group: Option<i32>,
    broken_status: bool,
}

impl ShellState {
    fn execute(&mut self, command: &str) -> Effect {
        if command.is_empty() || command.starts_with('#') {
            return Effect::Silent;
        }
        if command == ")" {
            self.last_status = self.group.take().unwrap_or(0);
            return Effect::Silent;
        }
        if self.group.is_some_and(|status| status != 0) {
            return Effect::Silent;
        }

        let (name, args) = command.split_once(' ').unwrap_or((command, ""));
        let (status, effect) = match name {
            "(" => {
                self.group = Some(0);
                return Effect::Silent;
            }
            "hang" => return Effect::Hang,
            "tick" => {
                let mut parts = args.split_whitespace().map(|p| p.parse::<u64>().unwrap_or(0));
                let count = parts.next().unwrap_or(0) as usize;
                let interval = Duration::from_millis(parts.next().unwrap_or(0));
                (0, Effect::Ticks { count, interval })
            }
            "disconnect" => return Effect::Disconnect,
            "transport-error" => return Effect::TransportError,
            "true" | "set" => (0, Effect::Silent),
            "false" => (1, Effect::Silent),
            "exit-with" => (args.trim().parse().unwrap_or(2), Effect::Silent),
            "break-status" => {
                self.broken_status = true;
                (0, Effect::Silent)
            }
            "cd" if args.contains("missing") => (
                2,
                Effect::Print(format!("sh: cd: can't cd to {}", args)),
            ),
            "cd" => (0, Effect::Silent),
            "echo" => {
                let status = if self.broken_status {
                    "oops".to_string()
                } else {
                    self.last_status.to_string()
                };
                (0, Effect::Print(args.replace("$?", &status)))
            }
            other => (127, Effect::Print(format!("sh: {}: not found", other))),
        };

        if let Some(group) = self.group.as_mut() {
            *group = status;
        }
        self.last_status = status;
        effect
    }
}

async fn run_shell(
    mut input: mpsc::UnboundedReceiver<String>,
    output: Output,
    chunk_size: Option<usize>,
) {
    let mut state = ShellState::default();
    let mut hung = false;

    while let Some(data) = input.recv().await {
        for command in data.lines() {
            if hung {
                continue;
            }
            match state.execute(command.trim()) {
                Effect::Silent => {}
                Effect::Print(text) => print(&output, &text, chunk_size),
                Effect::Ticks { count, interval } => {
                    for _ in 0..count {
                        tokio::time::sleep(interval).await;
                        let _ = output.send(Ok(".".to_string()));
                    }
                    let _ = output.send(Ok("\n".to_string()));
                }
                Effect::Hang => hung = true,
                Effect::Disconnect => return,
                Effect::TransportError => {
                    let _ = output.send(Err(SessionError::Transport(
                        "connection reset by peer".to_string(),
                    )));
                    return;
                }
            }
        }
    }
}

fn print(output: &Output, text: &str, chunk_size: Option<usize>) {
    let framed = format!("{}\n", text);
    match chunk_size {
        None => {
            let _ = output.send(Ok(framed));
        }
        Some(size) => {
            let chars: Vec<char> = framed.chars().collect();
            for piece in chars.chunks(size) {
                let _ = output.send(Ok(piece.iter().collect()));
            }
        }
    }
}
