//! # Host-side Terminals
//!
//! Maps host-allocated numeric ids to terminal widgets provided by a `TerminalService`.
//!
//! ## Invariants
//!
//! - Ids come from a counter starting at 0 and are allocated only after the widget
//!   exists, so a failed creation consumes no id and no id is ever reused.
//! - A caller-supplied `options.id` must be unique among live terminals.
//! - Operations on unknown ids are no-ops. Disposal races are expected.
//! - Each terminal leaves the map exactly once, and that removal is what sends
//!   `$terminal_closed`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::event::Subscription;
use crate::protocol::interfaces::TerminalServiceExt;
use crate::protocol::interfaces::TerminalServiceMain;
use crate::protocol::model::TerminalCreationOptions;

/// Widget options after translation from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalWidgetOptions {
    pub title: Option<String>,
    pub shell_path: Option<String>,
    pub shell_args: Vec<String>,
    pub cwd: Option<String>,
    pub env: HashMap<String, Option<String>>,
    pub destroy_on_close: bool,
    pub override_title: bool,
    pub id: Option<String>,
}

impl From<TerminalCreationOptions> for TerminalWidgetOptions {
    fn from(options: TerminalCreationOptions) -> Self {
        Self {
            title: options.title,
            shell_path: options.shell_path,
            shell_args: options.shell_args.unwrap_or_default(),
            cwd: options.cwd,
            env: options.env.unwrap_or_default(),
            destroy_on_close: options.destroy_term_on_close.unwrap_or(true),
            override_title: options.override_title.unwrap_or(false),
            id: options.id,
        }
    }
}

/// A terminal UI widget. The pty behind it is not our concern.
pub trait TerminalWidget: Send + Sync {
    fn send_text(&self, text: &str);

    fn show(&self, preserve_focus: bool);

    fn hide(&self);

    fn dispose(&self);

    /// Registers a listener for the widget closing on its own (user closed it, shell exited).
    fn on_did_close(&self, listener: Box<dyn Fn() + Send + Sync>) -> Subscription;
}

#[async_trait::async_trait]
pub trait TerminalService: Send + Sync {
    async fn new_terminal(&self, options: TerminalWidgetOptions) -> anyhow::Result<Arc<dyn TerminalWidget>>;
}

struct TerminalEntry {
    widget: Arc<dyn TerminalWidget>,
    on_close: Subscription,
    external_id: Option<String>,
}

struct TerminalRegistry {
    next_id: AtomicU64,
    terminals: DashMap<u64, TerminalEntry>,
    external_ids: DashMap<String, ()>,
    proxy: Arc<dyn TerminalServiceExt>,
}

impl TerminalRegistry {
    /// Removes `id` and tells the plugin side. Returns the widget if this call removed it.
    fn evict(&self, id: u64) -> Option<Arc<dyn TerminalWidget>> {
        let (_, entry) = self.terminals.remove(&id)?;
        entry.on_close.dispose();
        if let Some(external_id) = &entry.external_id {
            self.external_ids.remove(external_id);
        }
        self.proxy.terminal_closed(id);
        tracing::debug!(terminal = id, "terminal evicted");
        Some(entry.widget)
    }

    fn widget(&self, id: u64) -> Option<Arc<dyn TerminalWidget>> {
        self.terminals.get(&id).map(|entry| entry.widget.clone())
    }
}

pub struct TerminalServiceMainImpl {
    service: Arc<dyn TerminalService>,
    registry: Arc<TerminalRegistry>,
}

impl TerminalServiceMainImpl {
    pub fn new(service: Arc<dyn TerminalService>, proxy: Arc<dyn TerminalServiceExt>) -> Self {
        Self {
            service,
            registry: Arc::new(TerminalRegistry {
                next_id: AtomicU64::new(0),
                terminals: DashMap::new(),
                external_ids: DashMap::new(),
                proxy,
            }),
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.registry.terminals.contains_key(&id)
    }

    pub fn live_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.registry.terminals.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    fn reserve_external_id(&self, external_id: Option<&str>) -> CallResult<()> {
        let Some(external_id) = external_id else { return Ok(()) };
        match self.registry.external_ids.entry(external_id.to_string()) {
            Entry::Occupied(_) => Err(FailureReason::failed(format!("Terminal id {} is already in use", external_id))),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(())
            }
        }
    }
}

/// Line endings become `\r`, which is what a terminal expects as Enter.
pub fn normalize_terminal_text(text: &str, add_new_line: bool) -> String {
    let mut text = text.replace("\r\n", "\r").replace('\n', "\r");
    if add_new_line && !text.ends_with('\r') {
        text.push('\r');
    }
    text
}

#[async_trait::async_trait]
impl TerminalServiceMain for TerminalServiceMainImpl {
    async fn create_terminal(&self, options: TerminalCreationOptions) -> CallResult<u64> {
        let options = TerminalWidgetOptions::from(options);
        let external_id = options.id.clone();
        self.reserve_external_id(external_id.as_deref())?;

        let widget = match self.service.new_terminal(options).await {
            Ok(widget) => widget,
            Err(e) => {
                if let Some(external_id) = &external_id {
                    self.registry.external_ids.remove(external_id);
                }
                tracing::warn!(error = %e, "terminal widget creation failed");
                return Err(FailureReason::failed(format!("Failed to create terminal: {}", e)));
            }
        };

        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
        let registry: Weak<TerminalRegistry> = Arc::downgrade(&self.registry);
        let on_close = widget.on_did_close(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.evict(id);
            }
        }));
        self.registry.terminals.insert(id, TerminalEntry { widget, on_close, external_id });
        tracing::info!(terminal = id, "terminal created");
        Ok(id)
    }

    fn send_text(&self, id: u64, text: String, add_new_line: bool) {
        match self.registry.widget(id) {
            Some(widget) => widget.send_text(&normalize_terminal_text(&text, add_new_line)),
            None => tracing::debug!(terminal = id, "send_text for unknown terminal ignored"),
        }
    }

    fn show(&self, id: u64, preserve_focus: bool) {
        if let Some(widget) = self.registry.widget(id) {
            widget.show(preserve_focus);
        }
    }

    fn hide(&self, id: u64) {
        if let Some(widget) = self.registry.widget(id) {
            widget.hide();
        }
    }

    fn dispose(&self, id: u64) {
        if let Some(widget) = self.registry.evict(id) {
            widget.dispose();
        }
    }
}
