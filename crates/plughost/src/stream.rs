//! # Stream Transport
//!
//! Newline-delimited JSON over a pair of byte streams.
//!
//! Used for plugin runtimes that are separate OS processes: the host talks to the child's
//! stdin/stdout, and the child talks to its own. Each frame is written as one line.
//! serde_json never emits raw newlines inside a compact document, so a line is a frame.

use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::transport;
use crate::transport::Transport;
use crate::transport::TransportError;

type Reader = Box<dyn AsyncBufRead + Unpin + Send>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

pub struct StreamTransport {
    reader: Mutex<Reader>,
    writer: Mutex<Writer>,
    max_frame_bytes: usize,
}

impl StreamTransport {
    pub fn new(
        reader: impl AsyncBufRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            reader: Mutex::new(Box::new(reader)),
            writer: Mutex::new(Box::new(writer)),
            max_frame_bytes,
        }
    }

    /// The current process's stdin/stdout. Logging must go to stderr when this is used.
    pub fn stdio(max_frame_bytes: usize) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), max_frame_bytes)
    }

    /// Spawns `command` with piped stdio and connects to it.
    ///
    /// The child's stderr is inherited so its logs reach the host's terminal.
    pub fn spawn_child(mut command: Command, max_frame_bytes: usize) -> transport::Result<(Self, Child)> {
        command
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);
        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Io("Child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Io("Child stdout not captured".into()))?;
        Ok((Self::new(BufReader::new(stdout), stdin, max_frame_bytes), child))
    }
}

#[async_trait::async_trait]
impl Transport for StreamTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        if payload.len() > self.max_frame_bytes {
            return Err(TransportError::PayloadTooLarge);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(payload).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut reader = self.reader.lock().await;
        loop {
            let mut line = Vec::new();
            let read = reader.read_until(b'\n', &mut line).await?;
            if read == 0 {
                return Ok(None);
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            // Blank lines are keep-alives.
            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_frame_bytes {
                return Err(TransportError::PayloadTooLarge);
            }
            return Ok(Some(line));
        }
    }
}
