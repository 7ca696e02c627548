//! # Protocol
//!
//! Everything the host and the plugin runtime must agree on above the frame layer:
//!
//! - `ids`: the proxy identifier table;
//! - `interfaces`: one `rpc_interface!` declaration per identifier;
//! - `model`: the data carried by those interfaces (1-based coordinates);
//! - `plugin`: plugin metadata sent with `$load_plugin`.

pub mod ids;
pub mod interfaces;
pub mod model;
pub mod plugin;
