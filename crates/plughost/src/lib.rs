//! # Plughost
//!
//! A multi-process plugin runtime. An IDE host and one or more plugin runtimes talk over
//! a message channel; each side exposes typed interfaces the other calls through proxies.
//!
//! ## Architecture
//!
//! - `transport`, `channel`, `stream`: the message channel (in-process duplex or
//!   newline-delimited JSON over pipes).
//! - `peer`: the RPC protocol. One `Peer` per connection, with its handler registry,
//!   proxies and pending calls.
//! - `protocol`: the shared contract. Interface declarations, proxy identifiers and the
//!   wire data model.
//! - `main`: host-side adapters (`*Main`), backed by host collaborator traits.
//! - `ext`: plugin-side adapters (`*Ext`) and the `PluginApi` plugins program against.
//! - `plugin`: the plugin runtime bootstrap and plugin lifecycle.
//! - `event`: emitters and disposable subscriptions used throughout.
//!
//! ## Invariants
//!
//! - Line and column numbers are 1-based on the wire and 0-based in `ext` types.
//! - Notifications are applied in arrival order on each connection.
//! - Nothing the plugin side knows about an editor or document exists before the
//!   delta that added it.

pub mod channel;
pub mod config;
pub mod event;
pub mod ext;
pub mod logging;
pub mod main;
pub mod peer;
pub mod plugin;
pub mod protocol;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod tests;

pub use channel::DuplexChannelTransport;
pub use config::EnvConfig;
pub use config::HostConfig;
pub use event::DisposableStore;
pub use event::Emitter;
pub use event::Subscription;
pub use ext::PluginApi;
pub use main::HostServices;
pub use main::MainContext;
pub use peer::Peer;
pub use peer::PeerError;
pub use stream::StreamTransport;
pub use transport::Transport;
pub use transport::TransportError;

pub use plugrpc::CallResult;
pub use plugrpc::FailureReason;
