//! # Wire Frames
//!
//! Every message on a channel is one JSON object tagged by `kind`:
//!
//! ```text
//! {"kind":"request","callId":7,"proxyId":"TerminalServiceMain","method":"$create_terminal","args":[{..}]}
//! {"kind":"reply","callId":7,"result":0}
//! {"kind":"reply","callId":7,"error":{"kind":"disposed","detail":"TextEditor(e1)"}}
//! {"kind":"notify","proxyId":"TerminalServiceMain","method":"$send_text","args":[0,"ls",true]}
//! {"kind":"cancel","callId":7}
//! ```
//!
//! ## Invariants
//!
//! - `callId` is scoped to the side that sent the request and never reused on one connection.
//! - A reply carries exactly one of `result` and `error`. An absent `result` is `null`.
//! - `cancel` refers to a request the sender issued earlier; the receiver sends no reply for it.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::CallResult;
use crate::error::FailureReason;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Frame {
    Request {
        #[serde(rename = "callId")]
        call_id: u64,
        #[serde(rename = "proxyId")]
        proxy_id: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Reply {
        #[serde(rename = "callId")]
        call_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<FailureReason>,
    },
    Notify {
        #[serde(rename = "proxyId")]
        proxy_id: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Cancel {
        #[serde(rename = "callId")]
        call_id: u64,
    },
}

impl Frame {
    pub fn request(call_id: u64, proxy_id: &str, method: &str, args: Vec<Value>) -> Self {
        Self::Request {
            call_id,
            proxy_id: proxy_id.to_string(),
            method: method.to_string(),
            args,
        }
    }

    pub fn notify(proxy_id: &str, method: &str, args: Vec<Value>) -> Self {
        Self::Notify {
            proxy_id: proxy_id.to_string(),
            method: method.to_string(),
            args,
        }
    }

    /// Builds a reply from a handler outcome.
    pub fn reply(call_id: u64, outcome: CallResult<Value>) -> Self {
        match outcome {
            Ok(value) => Self::Reply { call_id, result: Some(value), error: None },
            Err(reason) => Self::Reply { call_id, result: None, error: Some(reason) },
        }
    }

    pub fn cancel(call_id: u64) -> Self {
        Self::Cancel { call_id }
    }

    /// The call id this frame correlates with, if any.
    pub fn call_id(&self) -> Option<u64> {
        match self {
            Self::Request { call_id, .. } | Self::Reply { call_id, .. } | Self::Cancel { call_id } => {
                Some(*call_id)
            }
            Self::Notify { .. } => None,
        }
    }
}

/// Collapses the two optional reply fields into an outcome.
pub fn reply_outcome(result: Option<Value>, error: Option<FailureReason>) -> CallResult<Value> {
    match error {
        Some(reason) => Err(reason),
        None => Ok(result.unwrap_or(Value::Null)),
    }
}
