//! # PlugRPC
//!
//! The shared contract between an IDE host and its plugin runtimes.
//!
//! ## Architecture
//!
//! Everything in this crate must be identical in both processes:
//!
//! - `frame`: the JSON envelope (request, reply, notify, cancel).
//! - `codec`: bytes to frames, typed values to positional arguments.
//! - `error`: local codec errors and the `FailureReason` taxonomy that crosses the wire.
//! - `identifier`: typed `ProxyIdentifier`s that name interfaces.
//! - `interface`: the `Handler` / `Remote` seams and the `rpc_interface!` macro.
//!
//! The connection itself (pump, pending calls, handler registry) lives in `plughost`.

pub mod codec;
pub mod error;
pub mod frame;
pub mod identifier;
pub mod interface;

#[cfg(test)]
mod tests;

pub use error::CallResult;
pub use error::FailureReason;
pub use error::RpcError;
pub use frame::Frame;
pub use identifier::ProxyIdentifier;
pub use interface::Handler;
pub use interface::Interface;
pub use interface::Remote;

pub use async_trait::async_trait;
pub use serde_json::Value;

#[doc(hidden)]
pub use tracing as __tracing;
