//! # Codec
//!
//! Bytes to frames and typed values to positional arguments.
//!
//! ## Philosophy
//!
//! - **Two passes**: a payload is parsed into a `serde_json::Value` first, checked for
//!   depth, and only then shaped into a `Frame`. A request that fails the second pass
//!   still yields its call id so the peer can answer with an error instead of leaving
//!   the caller hanging.
//! - **Positional arguments**: methods take `args: [..]`. Missing trailing arguments
//!   decode as `null`, which lets optional parameters be omitted by the caller.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CallResult;
use crate::error::Result;
use crate::error::RpcError;
use crate::frame::Frame;

/// Safety limit for JSON nesting inside a frame.
pub const MAX_DEPTH: usize = 64;

/// Default upper bound for one frame, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(frame)?)
}

/// Decodes one frame, enforcing `max_bytes` and `MAX_DEPTH`.
pub fn decode_frame(bytes: &[u8], max_bytes: usize) -> Result<Frame> {
    if bytes.len() > max_bytes {
        return Err(RpcError::PayloadTooLarge { size: bytes.len(), limit: max_bytes });
    }
    let value: Value = serde_json::from_slice(bytes)?;
    check_depth(&value, 0)?;
    serde_json::from_value(value)
        .map_err(|e| RpcError::ProtocolViolation(format!("Invalid frame: {}", e)))
}

/// Recovers the call id of a request whose frame did not decode.
///
/// Returns `None` for anything that is not recognisably a request.
pub fn peek_request_id(bytes: &[u8]) -> Option<u64> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    let object = value.as_object()?;
    if object.get("kind")?.as_str()? != "request" {
        return None;
    }
    object.get("callId")?.as_u64()
}

fn check_depth(value: &Value, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(RpcError::RecursionLimitExceeded);
    }
    match value {
        Value::Array(items) => items.iter().try_for_each(|v| check_depth(v, depth + 1)),
        Value::Object(map) => map.values().try_for_each(|v| check_depth(v, depth + 1)),
        _ => Ok(()),
    }
}

/// Builds a positional argument list.
///
/// The first encoding error is kept and reported by `finish`; later pushes are ignored.
#[derive(Debug, Default)]
pub struct ArgsEncoder {
    args: Vec<Value>,
    error: Option<RpcError>,
}

impl ArgsEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        if self.error.is_none() {
            match serde_json::to_value(value) {
                Ok(v) => self.args.push(v),
                Err(e) => self.error = Some(e.into()),
            }
        }
        self
    }

    pub fn finish(self) -> Result<Vec<Value>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.args),
        }
    }
}

/// Reads positional arguments in declaration order.
pub struct ArgsDecoder<'m> {
    method: &'m str,
    args: std::vec::IntoIter<Value>,
    index: usize,
}

impl<'m> ArgsDecoder<'m> {
    pub fn new(method: &'m str, args: Vec<Value>) -> Self {
        Self {
            method,
            args: args.into_iter(),
            index: 0,
        }
    }

    /// Decodes the next argument. An absent argument decodes from `null`.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T> {
        let index = self.index;
        self.index += 1;
        let value = self.args.next().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| RpcError::BadArgument {
            method: self.method.to_string(),
            index,
            details: e.to_string(),
        })
    }
}

/// Encodes a handler's return value for a reply.
pub fn to_result<T: Serialize>(value: &T) -> CallResult<Value> {
    serde_json::to_value(value).map_err(|e| RpcError::from(e).into())
}

/// Decodes a reply value into the declared return type.
pub fn from_result<T: DeserializeOwned>(method: &str, value: Value) -> CallResult<T> {
    serde_json::from_value(value).map_err(|e| {
        RpcError::ProtocolViolation(format!("Unexpected result for {}: {}", method, e)).into()
    })
}
