//! # Ext Side
//!
//! Adapters that live in the plugin runtime. Each one mirrors host state from the
//! notifications it receives and turns plugin calls into requests to the matching
//! `*Main` proxy. Coordinates are 0-based here; `convert` is the only place that
//! crosses the 1-based boundary.

pub mod api;
pub mod commands;
pub mod convert;
pub mod documents;
pub mod editors_and_documents;
pub mod quick_open;
pub mod terminal;
pub mod text_editor;
pub mod text_editors;
pub mod types;
pub mod workspace;

pub use api::PluginApi;
