//! # Plugin API
//!
//! The single object plugins program against. `PluginApi::install` builds every Ext
//! adapter, registers each one on the peer under its identifier and groups them into
//! the `commands`, `window`, `workspace` and `env` namespaces.
//!
//! ## Invariants
//!
//! - Installed once per runtime, before any plugin code runs.
//! - Every plugin in the runtime shares the same instance.

use std::sync::Arc;

use plugrpc::CallResult;
use plugrpc::Value;
use tokio_util::sync::CancellationToken;

use crate::config::EnvConfig;
use crate::event::Subscription;
use crate::ext::commands::CommandHandler;
use crate::ext::commands::CommandRegistryExtImpl;
use crate::ext::documents::DocumentDataExt;
use crate::ext::documents::DocumentsExtImpl;
use crate::ext::editors_and_documents::EditorsAndDocumentsExtImpl;
use crate::ext::quick_open::InputValidator;
use crate::ext::quick_open::QuickOpenExtImpl;
use crate::ext::terminal::Terminal;
use crate::ext::terminal::TerminalServiceExtImpl;
use crate::ext::text_editor::TextEditorExt;
use crate::ext::text_editors::TextEditorsExtImpl;
use crate::ext::types::InputBoxOptions;
use crate::ext::types::QuickPickItem;
use crate::ext::types::QuickPickOptions;
use crate::ext::types::TerminalOptions;
use crate::ext::workspace::WorkspaceExtImpl;
use crate::peer;
use crate::peer::Peer;
use crate::protocol::ids;
use crate::protocol::interfaces::CommandRegistryExt;
use crate::protocol::interfaces::DocumentsExt;
use crate::protocol::interfaces::EditorsAndDocumentsExt;
use crate::protocol::interfaces::QuickOpenExt;
use crate::protocol::interfaces::TerminalServiceExt;
use crate::protocol::interfaces::TextEditorsExt;
use crate::protocol::interfaces::WorkspaceExt;
use crate::protocol::model::CommandDescriptor;
use crate::protocol::model::WorkspaceFolder;

pub struct Commands {
    registry: Arc<CommandRegistryExtImpl>,
}

impl Commands {
    pub fn register_command(&self, descriptor: CommandDescriptor, handler: CommandHandler) -> CallResult<Subscription> {
        self.registry.register_command(descriptor, handler)
    }

    pub async fn execute_command(&self, id: &str, args: Vec<Value>) -> CallResult<Option<Value>> {
        self.registry.execute_command(id, args).await
    }

    pub async fn get_commands(&self) -> CallResult<Vec<String>> {
        self.registry.get_commands().await
    }
}

pub struct Window {
    terminals: Arc<TerminalServiceExtImpl>,
    quick_open: Arc<QuickOpenExtImpl>,
    text_editors: Arc<TextEditorsExtImpl>,
}

impl Window {
    pub fn create_terminal(&self, options: TerminalOptions) -> Terminal {
        self.terminals.create_terminal(options)
    }

    pub fn on_did_close_terminal(&self, listener: impl Fn(&Terminal) + Send + Sync + 'static) -> Subscription {
        self.terminals.on_did_close_terminal(listener)
    }

    pub async fn show_quick_pick(
        &self,
        items: Vec<QuickPickItem>,
        options: QuickPickOptions,
        token: Option<&CancellationToken>,
    ) -> CallResult<Option<QuickPickItem>> {
        self.quick_open.show_quick_pick(items, options, token).await
    }

    pub async fn show_input_box(
        &self,
        options: InputBoxOptions,
        validator: Option<InputValidator>,
        token: Option<&CancellationToken>,
    ) -> CallResult<Option<String>> {
        self.quick_open.show_input_box(options, validator, token).await
    }

    pub fn active_text_editor(&self) -> Option<Arc<TextEditorExt>> {
        self.text_editors.active_text_editor()
    }

    pub fn visible_text_editors(&self) -> Vec<Arc<TextEditorExt>> {
        self.text_editors.visible_text_editors()
    }

    pub fn terminals(&self) -> &Arc<TerminalServiceExtImpl> {
        &self.terminals
    }

    pub fn quick_open(&self) -> &Arc<QuickOpenExtImpl> {
        &self.quick_open
    }

    pub fn text_editors(&self) -> &Arc<TextEditorsExtImpl> {
        &self.text_editors
    }
}

pub struct Workspace {
    folders: Arc<WorkspaceExtImpl>,
    documents: Arc<DocumentsExtImpl>,
}

impl Workspace {
    pub fn workspace_folders(&self) -> Vec<WorkspaceFolder> {
        self.folders.workspace_folders()
    }

    pub fn text_documents(&self) -> Vec<Arc<DocumentDataExt>> {
        self.documents.all_documents()
    }

    pub async fn open_text_document(&self, uri: &str) -> CallResult<Arc<DocumentDataExt>> {
        self.documents.open_text_document(uri).await
    }

    pub fn folders(&self) -> &Arc<WorkspaceExtImpl> {
        &self.folders
    }

    pub fn documents(&self) -> &Arc<DocumentsExtImpl> {
        &self.documents
    }
}

pub struct PluginApi {
    pub commands: Commands,
    pub window: Window,
    pub workspace: Workspace,
    pub env: EnvConfig,
    editors_and_documents: Arc<EditorsAndDocumentsExtImpl>,
}

impl PluginApi {
    /// Builds the Ext adapters and registers them on `peer`.
    pub fn install(peer: &Peer, env: EnvConfig) -> peer::Result<Arc<Self>> {
        let commands = Arc::new(CommandRegistryExtImpl::new(peer.get_proxy(ids::COMMAND_REGISTRY_MAIN)));
        let quick_open = Arc::new(QuickOpenExtImpl::new(peer.get_proxy(ids::QUICK_OPEN_MAIN)));
        let terminals = Arc::new(TerminalServiceExtImpl::new(peer.get_proxy(ids::TERMINAL_SERVICE_MAIN)));
        let editors_and_documents =
            Arc::new(EditorsAndDocumentsExtImpl::new(peer.get_proxy(ids::TEXT_EDITORS_MAIN)));
        let text_editors = Arc::new(TextEditorsExtImpl::new(editors_and_documents.clone()));
        let documents = Arc::new(DocumentsExtImpl::new(
            peer.get_proxy(ids::DOCUMENTS_MAIN),
            editors_and_documents.clone(),
        ));
        let folders = Arc::new(WorkspaceExtImpl::new());

        let handler: Arc<dyn CommandRegistryExt> = commands.clone();
        peer.set(ids::COMMAND_REGISTRY_EXT, handler)?;
        let handler: Arc<dyn QuickOpenExt> = quick_open.clone();
        peer.set(ids::QUICK_OPEN_EXT, handler)?;
        let handler: Arc<dyn TerminalServiceExt> = terminals.clone();
        peer.set(ids::TERMINAL_SERVICE_EXT, handler)?;
        let handler: Arc<dyn EditorsAndDocumentsExt> = editors_and_documents.clone();
        peer.set(ids::EDITORS_AND_DOCUMENTS_EXT, handler)?;
        let handler: Arc<dyn TextEditorsExt> = text_editors.clone();
        peer.set(ids::TEXT_EDITORS_EXT, handler)?;
        let handler: Arc<dyn DocumentsExt> = documents.clone();
        peer.set(ids::DOCUMENTS_EXT, handler)?;
        let handler: Arc<dyn WorkspaceExt> = folders.clone();
        peer.set(ids::WORKSPACE_EXT, handler)?;

        tracing::debug!(peer = %peer.peer_name(), "plugin api installed");

        Ok(Arc::new(Self {
            commands: Commands { registry: commands },
            window: Window { terminals, quick_open, text_editors },
            workspace: Workspace { folders, documents },
            env,
            editors_and_documents,
        }))
    }

    pub fn editors_and_documents(&self) -> &Arc<EditorsAndDocumentsExtImpl> {
        &self.editors_and_documents
    }
}
