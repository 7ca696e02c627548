//! # Transport Abstraction
//!
//! A minimal, async interface for moving frames between a host and a plugin runtime.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The Transport knows nothing about frames, proxies or handlers.
//!   It moves opaque buffers, one frame per buffer.
//! - **Ordered and lossless**: whatever is sent arrives in send order or not at all.
//!   Everything above this layer relies on that.
//! - **Duplex**: `send` and `recv` are independent. The peer calls `recv` from one pump
//!   task and `send` from one writer task.

use std::fmt;

/// Errors that occur at the transport layer.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The other end is gone.
    ConnectionLost(String),
    /// The payload exceeds what the transport can carry.
    PayloadTooLarge,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::PayloadTooLarge => write!(f, "Payload too large for transport"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                Self::ConnectionLost(e.to_string())
            }
            _ => Self::Io(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A duplex message channel.
///
/// This trait is designed to be object-safe (`Box<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one frame.
    ///
    /// # invariants
    /// - Frames must arrive in the order they were sent.
    /// - Must return `Err` once the other end is gone.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Receives the next frame. `Ok(None)` signals an orderly close.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}
