//! # Error Definitions
//!
//! Two families of failure live here:
//!
//! - `RpcError`: the local codec failed to turn bytes into frames or values into
//!   arguments. Never crosses the wire.
//! - `FailureReason`: why a remote call did not produce a value. This is the `error`
//!   side of a reply frame and is serialised verbatim, so both processes must agree on it.

use serde::Deserialize;
use serde::Serialize;

/// Operational failures within the codec itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// serde_json rejected the payload or value.
    Serialization(String),
    /// The frame parsed as JSON but is not a valid envelope.
    ProtocolViolation(String),
    /// A frame exceeded the configured size limit.
    PayloadTooLarge { size: usize, limit: usize },
    /// JSON nesting exceeded `MAX_DEPTH`.
    RecursionLimitExceeded,
    /// A positional argument could not be decoded into the declared parameter type.
    BadArgument { method: String, index: usize, details: String },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            Self::PayloadTooLarge { size, limit } => {
                write!(f, "Payload of {} bytes exceeds limit of {} bytes", size, limit)
            }
            Self::RecursionLimitExceeded => write!(f, "Recursion limit exceeded"),
            Self::BadArgument { method, index, details } => {
                write!(f, "Bad argument {} for {}: {}", index, method, details)
            }
        }
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Reasons for an RPC failure (the `error` side of a reply).
///
/// `Disposed` is kept distinct from `Failed` so callers can special-case races
/// against resources that were closed while a call was in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum FailureReason {
    /// No handler is registered under the proxy id.
    HandlerNotFound(String),
    /// The handler exists but has no such method.
    MethodNotFound { proxy: String, method: String },
    /// Arguments did not match the method signature.
    BadArguments(String),
    /// The addressed object was removed or disposed.
    Disposed(String),
    /// The handler ran and reported an error.
    Failed(String),
    /// The channel closed before a reply arrived.
    Disconnected,
    /// The caller gave up waiting.
    Timeout,
    /// A frame or value could not be encoded or decoded.
    Codec(String),
}

impl FailureReason {
    /// Typed disposed-target error, e.g. `FailureReason::disposed("TextEditor(e1)")`.
    pub fn disposed(what: impl Into<String>) -> Self {
        Self::Disposed(what.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed(_))
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HandlerNotFound(proxy) => write!(f, "No handler registered for {}", proxy),
            Self::MethodNotFound { proxy, method } => {
                write!(f, "Unknown method {} on {}", method, proxy)
            }
            Self::BadArguments(details) => write!(f, "Bad arguments: {}", details),
            Self::Disposed(what) => write!(f, "Object disposed: {}", what),
            Self::Failed(message) => write!(f, "{}", message),
            Self::Disconnected => write!(f, "Channel disconnected"),
            Self::Timeout => write!(f, "Call timed out"),
            Self::Codec(details) => write!(f, "Codec error: {}", details),
        }
    }
}

impl std::error::Error for FailureReason {}

impl From<RpcError> for FailureReason {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::BadArgument { .. } => Self::BadArguments(e.to_string()),
            other => Self::Codec(other.to_string()),
        }
    }
}

/// Outcome of a remote call.
pub type CallResult<T> = std::result::Result<T, FailureReason>;
