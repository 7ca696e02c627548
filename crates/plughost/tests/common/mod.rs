//! Fake host collaborators and a connected Main/Ext harness.

#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;

use plughost::DuplexChannelTransport;
use plughost::HostConfig;
use plughost::HostServices;
use plughost::MainContext;
use plughost::Peer;
use plughost::PluginApi;
use plughost::Subscription;
use plughost::main::documents::DocumentStore;
use plughost::main::hosted_plugin::InstanceLauncher;
use plughost::main::hosted_plugin::MessageService;
use plughost::main::quick_open::QuickOpenService;
use plughost::main::terminal::TerminalService;
use plughost::main::terminal::TerminalWidget;
use plughost::main::terminal::TerminalWidgetOptions;
use plughost::main::text_editor::EditorControl;
use plughost::protocol::ids;
use plughost::protocol::interfaces::CommandRegistryExt;
use plughost::protocol::model::ApplyEditsOptions;
use plughost::protocol::model::InputBoxOptions;
use plughost::protocol::model::ModelAddedData;
use plughost::protocol::model::PickOpenItem;
use plughost::protocol::model::PickOptions;
use plughost::protocol::model::SingleEditOperation;
use plughost::protocol::model::TextEditorConfigurationUpdate;
use plughost::protocol::model::TextEditorRevealType;
use plughost::protocol::model::WireRange;
use plughost::protocol::model::WireSelection;

// ============================================================================
//  TERMINALS
// ============================================================================

#[derive(Default)]
pub struct FakeWidget {
    pub options: TerminalWidgetOptions,
    pub sent: Mutex<Vec<String>>,
    pub shown: AtomicUsize,
    pub hidden: AtomicUsize,
    pub disposed: AtomicBool,
    close_listener: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl FakeWidget {
    /// Simulates the user closing the terminal.
    pub fn close(&self) {
        let listener = self.close_listener.lock().clone();
        if let Some(listener) = listener {
            listener();
        }
    }
}

impl TerminalWidget for FakeWidget {
    fn send_text(&self, text: &str) {
        self.sent.lock().push(text.to_string());
    }

    fn show(&self, _preserve_focus: bool) {
        self.shown.fetch_add(1, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    fn on_did_close(&self, listener: Box<dyn Fn() + Send + Sync>) -> Subscription {
        *self.close_listener.lock() = Some(Arc::from(listener));
        Subscription::empty()
    }
}

#[derive(Default)]
pub struct FakeTerminalService {
    pub widgets: Mutex<Vec<Arc<FakeWidget>>>,
    pub fail_next: AtomicBool,
}

impl FakeTerminalService {
    pub fn widget(&self, index: usize) -> Arc<FakeWidget> {
        self.widgets.lock()[index].clone()
    }

    pub fn count(&self) -> usize {
        self.widgets.lock().len()
    }
}

#[async_trait::async_trait]
impl TerminalService for FakeTerminalService {
    async fn new_terminal(&self, options: TerminalWidgetOptions) -> anyhow::Result<Arc<dyn TerminalWidget>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("no pty available");
        }
        let widget = Arc::new(FakeWidget { options, ..Default::default() });
        self.widgets.lock().push(widget.clone());
        Ok(widget)
    }
}

// ============================================================================
//  EDITORS AND DOCUMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCall {
    Configuration(TextEditorConfigurationUpdate),
    Selections(Vec<WireSelection>),
    Reveal(WireRange, TextEditorRevealType),
    Edits(u64, Vec<SingleEditOperation>),
}

pub struct FakeEditorControl {
    pub calls: Mutex<Vec<ControlCall>>,
    pub version: Mutex<u64>,
}

impl FakeEditorControl {
    pub fn new(version: u64) -> Self {
        Self { calls: Mutex::new(Vec::new()), version: Mutex::new(version) }
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl EditorControl for FakeEditorControl {
    fn set_configuration(&self, update: TextEditorConfigurationUpdate) -> anyhow::Result<()> {
        self.calls.lock().push(ControlCall::Configuration(update));
        Ok(())
    }

    fn set_selections(&self, selections: &[WireSelection]) -> anyhow::Result<()> {
        self.calls.lock().push(ControlCall::Selections(selections.to_vec()));
        Ok(())
    }

    fn reveal_range(&self, range: WireRange, reveal_type: TextEditorRevealType) -> anyhow::Result<()> {
        self.calls.lock().push(ControlCall::Reveal(range, reveal_type));
        Ok(())
    }

    async fn apply_edits(
        &self,
        model_version_id: u64,
        edits: Vec<SingleEditOperation>,
        _options: ApplyEditsOptions,
    ) -> anyhow::Result<bool> {
        self.calls.lock().push(ControlCall::Edits(model_version_id, edits));
        Ok(model_version_id == *self.version.lock())
    }
}

#[derive(Default)]
pub struct FakeDocumentStore {
    pub documents: Mutex<HashMap<String, ModelAddedData>>,
    pub saved: Mutex<Vec<String>>,
}

impl FakeDocumentStore {
    pub fn with_document(self, document: ModelAddedData) -> Self {
        self.documents.lock().insert(document.uri.clone(), document);
        self
    }
}

#[async_trait::async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn open(&self, uri: &str) -> anyhow::Result<ModelAddedData> {
        self.documents
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file: {}", uri))
    }

    async fn save(&self, uri: &str) -> anyhow::Result<bool> {
        self.saved.lock().push(uri.to_string());
        Ok(true)
    }
}

pub fn document(uri: &str, lines: &[&str]) -> ModelAddedData {
    ModelAddedData {
        uri: uri.into(),
        version_id: 1,
        lines: lines.iter().map(|l| l.to_string()).collect(),
        eol: "\n".into(),
        mode_id: "ts".into(),
        is_dirty: false,
    }
}

// ============================================================================
//  QUICK OPEN
// ============================================================================

#[derive(Default)]
pub struct FakeQuickOpen {
    pub opened: Mutex<Vec<(Vec<PickOpenItem>, PickOptions)>>,
    pub items: Mutex<Vec<PickOpenItem>>,
    pub errors: Mutex<Vec<String>>,
    pub inputs: Mutex<Vec<InputBoxOptions>>,
    pub hidden: AtomicUsize,
}

impl QuickOpenService for FakeQuickOpen {
    fn open(&self, items: &[PickOpenItem], options: &PickOptions) {
        self.opened.lock().push((items.to_vec(), options.clone()));
    }

    fn set_items(&self, items: &[PickOpenItem]) {
        *self.items.lock() = items.to_vec();
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn open_input(&self, options: &InputBoxOptions) {
        self.inputs.lock().push(options.clone());
    }

    fn hide(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
//  HOSTED INSTANCE
// ============================================================================

#[derive(Default)]
pub struct RecordingMessages {
    pub messages: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingMessages {
    pub fn with_level(&self, level: &str) -> Vec<String> {
        self.messages.lock().iter().filter(|(l, _)| *l == level).map(|(_, m)| m.clone()).collect()
    }
}

impl MessageService for RecordingMessages {
    fn info(&self, message: &str) {
        self.messages.lock().push(("info", message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.messages.lock().push(("warn", message.to_string()));
    }

    fn error(&self, message: &str) {
        self.messages.lock().push(("error", message.to_string()));
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    /// Outcomes for successive `run` calls. Empty means success.
    pub runs: Mutex<VecDeque<Result<String, String>>>,
    pub run_calls: AtomicUsize,
    pub running: AtomicBool,
}

impl FakeLauncher {
    pub fn script(&self, outcomes: Vec<Result<String, String>>) {
        *self.runs.lock() = outcomes.into();
    }
}

#[async_trait::async_trait]
impl InstanceLauncher for FakeLauncher {
    async fn run(&self, _location: &str) -> anyhow::Result<String> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.runs.lock().pop_front().unwrap_or_else(|| Ok("http://localhost:3030".into()));
        match outcome {
            Ok(url) => {
                self.running.store(true, Ordering::SeqCst);
                Ok(url)
            }
            Err(message) => Err(anyhow::anyhow!(message)),
        }
    }

    async fn terminate(&self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn is_plugin_valid(&self, location: &str) -> bool {
        location.ends_with("plugin")
    }
}

// ============================================================================
//  HARNESS
// ============================================================================

pub struct Harness {
    pub main_peer: Peer,
    pub ext_peer: Peer,
    pub main: Arc<MainContext>,
    pub api: Arc<PluginApi>,
    pub terminals: Arc<FakeTerminalService>,
    pub documents: Arc<FakeDocumentStore>,
    pub quick_open: Arc<FakeQuickOpen>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_documents(FakeDocumentStore::default())
    }

    pub fn with_documents(documents: FakeDocumentStore) -> Self {
        let (main_end, ext_end) = DuplexChannelTransport::pair();
        let config = HostConfig::standard();
        let main_peer = Peer::new("main", Box::new(main_end), &config);
        let ext_peer = Peer::new("ext", Box::new(ext_end), &config);

        let terminals = Arc::new(FakeTerminalService::default());
        let documents = Arc::new(documents);
        let quick_open = Arc::new(FakeQuickOpen::default());
        let services = HostServices {
            terminal_service: terminals.clone(),
            document_store: documents.clone(),
            quick_open_service: quick_open.clone(),
        };
        let main = MainContext::install(&main_peer, services).unwrap();
        let api = PluginApi::install(&ext_peer, config.env.clone()).unwrap();

        Self { main_peer, ext_peer, main, api, terminals, documents, quick_open }
    }

    /// Returns once every notification the host sent so far has been applied by the
    /// plugin side.
    pub async fn flush_to_ext(&self) {
        let proxy = self.main_peer.get_proxy(ids::COMMAND_REGISTRY_EXT);
        let _ = proxy.execute_command("__flush".into(), vec![]).await;
    }

    /// Returns once every notification the plugin side sent so far has been applied by
    /// the host.
    pub async fn flush_to_main(&self) {
        let _ = self.api.commands.get_commands().await;
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
