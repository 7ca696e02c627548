//! # Plugin-side Terminals
//!
//! `create_terminal` hands back a `Terminal` immediately. The host id arrives later.
//!
//! ## Architecture
//!
//! Every terminal owns one task. The task awaits `$create_terminal`, publishes the id on
//! a `watch` channel and then forwards queued operations in the order they were issued.
//! Operations issued before the id exists simply wait in the queue.
//!
//! ## Invariants
//!
//! - `on_did_close_terminal` fires once per terminal, on the emitter shared by the
//!   whole service.
//! - After `dispose` or a host-side close, every operation returns `Disposed` and a
//!   second `dispose` does nothing.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::event::Emitter;
use crate::event::Subscription;
use crate::ext::convert;
use crate::ext::types::TerminalOptions;
use crate::protocol::interfaces::TerminalServiceExt;
use crate::protocol::interfaces::TerminalServiceMain;

#[derive(Debug, Clone, PartialEq)]
pub enum TerminalId {
    Pending,
    Ready(u64),
    Failed(FailureReason),
}

#[derive(Debug)]
enum TerminalOp {
    SendText { text: String, add_new_line: bool },
    Show { preserve_focus: bool },
    Hide,
    Dispose,
}

struct TerminalInner {
    name: String,
    ops: mpsc::UnboundedSender<TerminalOp>,
    id: watch::Receiver<TerminalId>,
    disposed: AtomicBool,
}

/// Plugin-facing handle to a host terminal. Clones refer to the same terminal.
#[derive(Clone)]
pub struct Terminal {
    inner: Arc<TerminalInner>,
}

impl Terminal {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Resolves to the host id once `$create_terminal` has answered.
    pub async fn process_id(&self) -> CallResult<u64> {
        let mut rx = self.inner.id.clone();
        let state = rx
            .wait_for(|state| *state != TerminalId::Pending)
            .await
            .map_err(|_| FailureReason::Disconnected)?
            .clone();
        match state {
            TerminalId::Ready(id) => Ok(id),
            TerminalId::Failed(reason) => Err(reason),
            TerminalId::Pending => Err(FailureReason::Disconnected),
        }
    }

    pub fn send_text(&self, text: impl Into<String>, add_new_line: bool) -> CallResult<()> {
        self.enqueue(TerminalOp::SendText { text: text.into(), add_new_line })
    }

    pub fn show(&self, preserve_focus: bool) -> CallResult<()> {
        self.enqueue(TerminalOp::Show { preserve_focus })
    }

    pub fn hide(&self) -> CallResult<()> {
        self.enqueue(TerminalOp::Hide)
    }

    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.inner.ops.send(TerminalOp::Dispose).is_err() {
            tracing::debug!(terminal = %self.inner.name, "dispose after terminal task ended");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn enqueue(&self, op: TerminalOp) -> CallResult<()> {
        if self.is_disposed() {
            return Err(FailureReason::disposed(format!("Terminal({})", self.inner.name)));
        }
        self.inner.ops.send(op).map_err(|_| match &*self.inner.id.borrow() {
            TerminalId::Failed(reason) => reason.clone(),
            _ => FailureReason::Disconnected,
        })
    }

    fn mark_closed(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
    }
}

impl PartialEq for Terminal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("name", &self.inner.name)
            .field("id", &*self.inner.id.borrow())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Host ids not bound to a live facade.
#[derive(Default)]
struct Unbound {
    // Closes that arrived before the creating task bound the id.
    closed: HashSet<u64>,
    // Ids whose facade was dropped before the id arrived. Cleared by the host's close.
    orphaned: HashSet<u64>,
}

struct Shared {
    terminals: DashMap<u64, Terminal>,
    unbound: Mutex<Unbound>,
    on_did_close_terminal: Emitter<Terminal>,
}

impl Shared {
    fn new() -> Self {
        Self { terminals: DashMap::new(), unbound: Mutex::new(Unbound::default()), on_did_close_terminal: Emitter::new() }
    }

    /// Binds a freshly created id to its facade, if the facade is still around.
    fn bind(&self, id: u64, inner: Option<Arc<TerminalInner>>) {
        let mut unbound = self.unbound.lock();
        let closed = unbound.closed.remove(&id);
        match inner {
            Some(inner) if closed => {
                drop(unbound);
                self.close(Terminal { inner });
            }
            Some(inner) => {
                self.terminals.insert(id, Terminal { inner });
            }
            None if closed => {}
            None => {
                tracing::debug!(terminal = id, "terminal handle dropped before creation finished");
                unbound.orphaned.insert(id);
            }
        }
    }

    /// Handles the host's close of `id`.
    fn host_closed(&self, id: u64) {
        let mut unbound = self.unbound.lock();
        if let Some((_, terminal)) = self.terminals.remove(&id) {
            drop(unbound);
            self.close(terminal);
            return;
        }
        if !unbound.orphaned.remove(&id) {
            unbound.closed.insert(id);
        }
    }

    fn close(&self, terminal: Terminal) {
        terminal.mark_closed();
        tracing::debug!(terminal = %terminal.name(), "terminal closed");
        self.on_did_close_terminal.fire(&terminal);
    }
}

pub struct TerminalServiceExtImpl {
    proxy: Arc<dyn TerminalServiceMain>,
    shared: Arc<Shared>,
}

impl TerminalServiceExtImpl {
    pub fn new(proxy: Arc<dyn TerminalServiceMain>) -> Self {
        Self {
            proxy,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Must be called inside a tokio runtime.
    pub fn create_terminal(&self, options: TerminalOptions) -> Terminal {
        let name = options.name.clone().unwrap_or_else(|| "Terminal".to_string());
        let (ops, ops_rx) = mpsc::unbounded_channel();
        let (id_tx, id) = watch::channel(TerminalId::Pending);

        let terminal = Terminal {
            inner: Arc::new(TerminalInner { name, ops, id, disposed: AtomicBool::new(false) }),
        };

        tokio::spawn(run_terminal(
            self.proxy.clone(),
            self.shared.clone(),
            Arc::downgrade(&terminal.inner),
            convert::from_terminal_options(&options),
            id_tx,
            ops_rx,
        ));
        terminal
    }

    pub fn create_terminal_with(
        &self,
        name: Option<String>,
        shell_path: Option<String>,
        shell_args: Option<Vec<String>>,
    ) -> Terminal {
        self.create_terminal(TerminalOptions { name, shell_path, shell_args, ..TerminalOptions::default() })
    }

    pub fn on_did_close_terminal(&self, listener: impl Fn(&Terminal) + Send + Sync + 'static) -> Subscription {
        self.shared.on_did_close_terminal.subscribe(listener)
    }

    /// Terminals the host has assigned an id to and not yet closed.
    pub fn live_terminals(&self) -> usize {
        self.shared.terminals.len()
    }
}

async fn run_terminal(
    proxy: Arc<dyn TerminalServiceMain>,
    shared: Arc<Shared>,
    inner: Weak<TerminalInner>,
    options: crate::protocol::model::TerminalCreationOptions,
    id_tx: watch::Sender<TerminalId>,
    mut ops_rx: mpsc::UnboundedReceiver<TerminalOp>,
) {
    let id = match proxy.create_terminal(options).await {
        Ok(id) => id,
        Err(reason) => {
            tracing::warn!(error = %reason, "terminal creation failed");
            id_tx.send_replace(TerminalId::Failed(reason));
            ops_rx.close();
            while let Ok(op) = ops_rx.try_recv() {
                tracing::warn!(?op, "dropping terminal operation, terminal was never created");
            }
            return;
        }
    };

    id_tx.send_replace(TerminalId::Ready(id));
    shared.bind(id, inner.upgrade());

    while let Some(op) = ops_rx.recv().await {
        match op {
            TerminalOp::SendText { text, add_new_line } => proxy.send_text(id, text, add_new_line),
            TerminalOp::Show { preserve_focus } => proxy.show(id, preserve_focus),
            TerminalOp::Hide => proxy.hide(id),
            TerminalOp::Dispose => {
                proxy.dispose(id);
                break;
            }
        }
    }
}

#[async_trait::async_trait]
impl TerminalServiceExt for TerminalServiceExtImpl {
    fn terminal_closed(&self, id: u64) {
        self.shared.host_closed(id);
    }
}
