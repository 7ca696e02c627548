//! # Main Side
//!
//! Adapters that live in the host process. Each `*Main` implementation answers the
//! plugin side's requests by delegating to a host collaborator trait, and pushes host
//! state to the plugin side through the matching `*Ext` proxy.
//!
//! `MainContext::install` wires one connection: it builds every adapter from the
//! collaborators in `HostServices` and registers the `*Main` handlers on the peer.

pub mod commands;
pub mod documents;
pub mod editors_and_documents;
pub mod hosted_plugin;
pub mod quick_open;
pub mod terminal;
pub mod text_editor;
pub mod text_editors;

use std::sync::Arc;

use crate::main::commands::CommandRegistryMainImpl;
use crate::main::documents::DocumentStore;
use crate::main::documents::DocumentsMainImpl;
use crate::main::editors_and_documents::EditorsAndDocumentsMain;
use crate::main::quick_open::QuickOpenMainImpl;
use crate::main::quick_open::QuickOpenService;
use crate::main::terminal::TerminalService;
use crate::main::terminal::TerminalServiceMainImpl;
use crate::main::text_editors::TextEditorsMainImpl;
use crate::peer;
use crate::peer::Peer;
use crate::protocol::ids;
use crate::protocol::interfaces::CommandRegistryMain;
use crate::protocol::interfaces::DocumentsMain;
use crate::protocol::interfaces::HostedPluginManagerExt;
use crate::protocol::interfaces::QuickOpenMain;
use crate::protocol::interfaces::TerminalServiceMain;
use crate::protocol::interfaces::TextEditorsMain;
use crate::protocol::interfaces::WorkspaceExt;

/// Host collaborators behind the Main adapters.
#[derive(Clone)]
pub struct HostServices {
    pub terminal_service: Arc<dyn TerminalService>,
    pub document_store: Arc<dyn DocumentStore>,
    pub quick_open_service: Arc<dyn QuickOpenService>,
}

/// Every Main adapter of one connection, plus the proxies the host drives directly.
pub struct MainContext {
    pub editors_and_documents: Arc<EditorsAndDocumentsMain>,
    pub text_editors: Arc<TextEditorsMainImpl>,
    pub documents: Arc<DocumentsMainImpl>,
    pub terminals: Arc<TerminalServiceMainImpl>,
    pub commands: Arc<CommandRegistryMainImpl>,
    pub quick_open: Arc<QuickOpenMainImpl>,
    pub workspace: Arc<dyn WorkspaceExt>,
    pub plugin_manager: Arc<dyn HostedPluginManagerExt>,
}

impl MainContext {
    pub fn install(peer: &Peer, services: HostServices) -> peer::Result<Arc<Self>> {
        let editors_and_documents = Arc::new(EditorsAndDocumentsMain::new(peer.get_proxy(ids::EDITORS_AND_DOCUMENTS_EXT)));
        let text_editors = Arc::new(TextEditorsMainImpl::new(
            editors_and_documents.clone(),
            peer.get_proxy(ids::TEXT_EDITORS_EXT),
        ));
        let documents = Arc::new(DocumentsMainImpl::new(
            services.document_store,
            editors_and_documents.clone(),
            peer.get_proxy(ids::DOCUMENTS_EXT),
        ));
        let terminals = Arc::new(TerminalServiceMainImpl::new(
            services.terminal_service,
            peer.get_proxy(ids::TERMINAL_SERVICE_EXT),
        ));
        let commands = Arc::new(CommandRegistryMainImpl::new(peer.get_proxy(ids::COMMAND_REGISTRY_EXT)));
        let quick_open = Arc::new(QuickOpenMainImpl::new(
            services.quick_open_service,
            peer.get_proxy(ids::QUICK_OPEN_EXT),
        ));

        let handler: Arc<dyn CommandRegistryMain> = commands.clone();
        peer.set(ids::COMMAND_REGISTRY_MAIN, handler)?;
        let handler: Arc<dyn QuickOpenMain> = quick_open.clone();
        peer.set(ids::QUICK_OPEN_MAIN, handler)?;
        let handler: Arc<dyn TerminalServiceMain> = terminals.clone();
        peer.set(ids::TERMINAL_SERVICE_MAIN, handler)?;
        let handler: Arc<dyn TextEditorsMain> = text_editors.clone();
        peer.set(ids::TEXT_EDITORS_MAIN, handler)?;
        let handler: Arc<dyn DocumentsMain> = documents.clone();
        peer.set(ids::DOCUMENTS_MAIN, handler)?;

        tracing::debug!(peer = %peer.peer_name(), "main context installed");

        Ok(Arc::new(Self {
            editors_and_documents,
            text_editors,
            documents,
            terminals,
            commands,
            quick_open,
            workspace: peer.get_proxy(ids::WORKSPACE_EXT),
            plugin_manager: peer.get_proxy(ids::HOSTED_PLUGIN_MANAGER_EXT),
        }))
    }
}
