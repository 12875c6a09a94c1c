//! Line source abstraction for telemetry ingestion.
//!
//! Provides a unified trait for reading raw telemetry lines from different
//! transports: the serial port, stdin (piped simulator) and capture replay.
//! A [`Connector`] opens a fresh source each time the operator connects.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_serial::SerialStream;

use crate::acquisition::{open_serial, SerialSettings, TransportError};

/// Bytes buffered without a newline before they are emitted as a line anyway.
pub const MAX_LINE_BYTES: usize = 4_096;

/// Events produced by a line source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// One complete, trimmed, non-blank line.
    Line(String),
    /// The read timeout elapsed without a complete line.
    Idle,
    /// The transport reached end of data.
    Closed,
}

/// Trait abstracting where telemetry lines come from.
///
/// `next_line` must return within roughly one read timeout so the ingestion
/// loop can observe commands and cancellation between reads.
#[async_trait]
pub trait LineSource: Send + Sync + 'static {
    async fn next_line(&mut self) -> Result<LineEvent, TransportError>;

    /// Port or source name for logging and status (e.g. `/dev/ttyUSB0`, `stdin`).
    fn source_name(&self) -> &str;
}

// ============================================================================
// LineReader (any async byte stream)
// ============================================================================

/// Newline framing over an async byte stream with a bounded read timeout.
///
/// Partially received lines stay in `pending` across timeouts, so a timed-out
/// read never loses bytes.
pub struct LineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    read_timeout: Duration,
    name: String,
}

pub type SerialSource = LineReader<SerialStream>;
pub type StdinSource = LineReader<tokio::io::Stdin>;

impl<R: AsyncRead + Unpin + Send + Sync + 'static> LineReader<R> {
    pub fn new(inner: R, read_timeout: Duration, name: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::with_capacity(256),
            read_timeout,
            name: name.into(),
        }
    }

    /// Decode and clear the pending bytes; `None` if they are blank.
    fn take_pending(&mut self) -> Option<String> {
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        (!line.is_empty()).then_some(line)
    }
}

impl StdinSource {
    pub fn stdin(read_timeout: Duration) -> Self {
        Self::new(tokio::io::stdin(), read_timeout, "stdin")
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send + Sync + 'static> LineSource for LineReader<R> {
    async fn next_line(&mut self) -> Result<LineEvent, TransportError> {
        loop {
            let read = tokio::time::timeout(
                self.read_timeout,
                self.reader.read_until(b'\n', &mut self.pending),
            )
            .await;

            match read {
                Err(_elapsed) => {
                    if self.pending.len() >= MAX_LINE_BYTES {
                        tracing::debug!(bytes = self.pending.len(), "Emitting overlong unterminated line");
                        if let Some(line) = self.take_pending() {
                            return Ok(LineEvent::Line(line));
                        }
                    }
                    return Ok(LineEvent::Idle);
                }
                Ok(Ok(0)) => {
                    return Ok(match self.take_pending() {
                        Some(line) => LineEvent::Line(line),
                        None => LineEvent::Closed,
                    });
                }
                Ok(Ok(_)) => {
                    if let Some(line) = self.take_pending() {
                        return Ok(LineEvent::Line(line));
                    }
                }
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Ok(LineEvent::Idle);
                }
                Ok(Err(e)) => return Err(TransportError::Read(e)),
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Replay Source (capture file / scripted lines)
// ============================================================================

/// Replays pre-loaded lines with an inter-line delay, then reports `Closed`.
pub struct ReplaySource {
    lines: std::vec::IntoIter<String>,
    delay: Duration,
    yielded_first: bool,
    name: String,
}

impl ReplaySource {
    pub fn new(lines: Vec<String>, delay: Duration, name: impl Into<String>) -> Self {
        Self {
            lines: lines.into_iter(),
            delay,
            yielded_first: false,
            name: name.into(),
        }
    }
}

#[async_trait]
impl LineSource for ReplaySource {
    async fn next_line(&mut self) -> Result<LineEvent, TransportError> {
        if self.yielded_first && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        loop {
            match self.lines.next() {
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.yielded_first = true;
                    return Ok(LineEvent::Line(line.to_string()));
                }
                None => return Ok(LineEvent::Closed),
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Connectors
// ============================================================================

/// Opens a fresh line source on operator Connect.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&mut self) -> Result<Box<dyn LineSource>, TransportError>;

    /// Transport kind for logging (e.g. "serial", "stdin", "replay").
    fn kind(&self) -> &'static str;
}

/// Serial port connector: explicit port or auto-discovery.
pub struct SerialConnector {
    settings: SerialSettings,
    read_timeout: Duration,
}

impl SerialConnector {
    pub fn new(settings: SerialSettings, read_timeout: Duration) -> Self {
        Self {
            settings,
            read_timeout,
        }
    }
}

#[async_trait]
impl Connector for SerialConnector {
    async fn connect(&mut self) -> Result<Box<dyn LineSource>, TransportError> {
        let settings = self.settings.clone();
        let port = tokio::task::spawn_blocking(move || settings.resolve_port())
            .await
            .map_err(|e| TransportError::Unavailable {
                port: "auto".to_string(),
                message: e.to_string(),
            })??;

        let stream = open_serial(&port, self.settings.baud_rate)?;
        Ok(Box::new(SerialSource::new(stream, self.read_timeout, port)))
    }

    fn kind(&self) -> &'static str {
        "serial"
    }
}

/// Reads lines piped into the process, e.g. from `telemetry-sim`.
pub struct StdinConnector {
    read_timeout: Duration,
}

impl StdinConnector {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

#[async_trait]
impl Connector for StdinConnector {
    async fn connect(&mut self) -> Result<Box<dyn LineSource>, TransportError> {
        Ok(Box::new(StdinSource::stdin(self.read_timeout)))
    }

    fn kind(&self) -> &'static str {
        "stdin"
    }
}

enum ReplayInput {
    File(PathBuf),
    Lines(Vec<String>),
}

/// Replays a capture file (or in-memory lines) from the start on every connect.
pub struct ReplayConnector {
    input: ReplayInput,
    delay: Duration,
}

impl ReplayConnector {
    pub fn from_file(path: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            input: ReplayInput::File(path.into()),
            delay,
        }
    }

    pub fn from_lines<I, S>(lines: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: ReplayInput::Lines(lines.into_iter().map(Into::into).collect()),
            delay,
        }
    }
}

#[async_trait]
impl Connector for ReplayConnector {
    async fn connect(&mut self) -> Result<Box<dyn LineSource>, TransportError> {
        let (lines, name) = match &self.input {
            ReplayInput::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| TransportError::Unavailable {
                        port: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                let text = String::from_utf8_lossy(&bytes);
                (
                    text.lines().map(str::to_string).collect(),
                    path.display().to_string(),
                )
            }
            ReplayInput::Lines(lines) => (lines.clone(), "replay".to_string()),
        };
        Ok(Box::new(ReplaySource::new(lines, self.delay, name)))
    }

    fn kind(&self) -> &'static str {
        "replay"
    }
}
