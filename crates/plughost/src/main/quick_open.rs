//! # Host-side Quick Open
//!
//! Bridges `$show` and `$input` to a `QuickOpenService` UI. The request stays pending
//! until the UI reports an outcome through one of the hook methods (`select`,
//! `accept_selection`, `accept_input`, `close`).
//!
//! ## Invariants
//!
//! - At most one pick and one input are pending. A new one resolves the previous one
//!   as dismissed.
//! - The state lock is never held across an await or a call into the UI.
//! - A request dropped by its caller (remote cancellation) hides the UI if it is still
//!   the current one.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use plugrpc::CallResult;

use crate::protocol::interfaces::QuickOpenExt;
use crate::protocol::interfaces::QuickOpenMain;
use crate::protocol::model::InputBoxOptions;
use crate::protocol::model::PickOpenItem;
use crate::protocol::model::PickOptions;

/// The quick-open widget.
pub trait QuickOpenService: Send + Sync {
    fn open(&self, items: &[PickOpenItem], options: &PickOptions);

    fn set_items(&self, items: &[PickOpenItem]);

    fn show_error(&self, message: &str);

    fn open_input(&self, options: &InputBoxOptions);

    fn hide(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickOpenMode {
    /// The item was highlighted.
    Preview,
    /// The item was accepted.
    Open,
}

struct PendingPick {
    generation: u64,
    reply: oneshot::Sender<Option<Vec<u32>>>,
}

struct PendingInput {
    generation: u64,
    reply: oneshot::Sender<Option<String>>,
    validate: bool,
}

#[derive(Default)]
struct QuickOpenState {
    generation: u64,
    items: Vec<PickOpenItem>,
    pick: Option<PendingPick>,
    input: Option<PendingInput>,
}

impl QuickOpenState {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

pub struct QuickOpenMainImpl {
    service: Arc<dyn QuickOpenService>,
    proxy: Arc<dyn QuickOpenExt>,
    state: Mutex<QuickOpenState>,
}

/// Hides the UI when a pending request is dropped before the UI answered.
struct Abandoned<'a> {
    owner: &'a QuickOpenMainImpl,
    generation: u64,
    armed: bool,
}

impl Drop for Abandoned<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let current = {
            let mut state = self.owner.state.lock();
            let pick = state.pick.as_ref().is_some_and(|p| p.generation == self.generation);
            let input = state.input.as_ref().is_some_and(|i| i.generation == self.generation);
            if pick {
                state.pick = None;
            }
            if input {
                state.input = None;
            }
            pick || input
        };
        if current {
            tracing::debug!(generation = self.generation, "quick open request abandoned");
            self.owner.service.hide();
        }
    }
}

impl QuickOpenMainImpl {
    pub fn new(service: Arc<dyn QuickOpenService>, proxy: Arc<dyn QuickOpenExt>) -> Self {
        Self { service, proxy, state: Mutex::new(QuickOpenState::default()) }
    }

    /// UI hook: an item was highlighted (`Preview`) or accepted (`Open`).
    pub fn select(&self, handle: u32, mode: QuickOpenMode) {
        match mode {
            QuickOpenMode::Preview => self.proxy.on_item_selected(handle),
            QuickOpenMode::Open => self.accept_selection(vec![handle]),
        }
    }

    /// UI hook: the picker was accepted with `handles`.
    pub fn accept_selection(&self, handles: Vec<u32>) {
        let pending = self.state.lock().pick.take();
        if let Some(pending) = pending {
            let _ = pending.reply.send(Some(handles));
            self.service.hide();
        }
    }

    /// UI hook: asks the plugin to validate the current input. `None` means valid.
    pub async fn validate(&self, value: &str) -> CallResult<Option<String>> {
        let validate = self.state.lock().input.as_ref().is_some_and(|input| input.validate);
        if !validate {
            return Ok(None);
        }
        self.proxy.validate_input(value.to_string()).await
    }

    /// UI hook: the input box was accepted.
    pub fn accept_input(&self, value: impl Into<String>) {
        let pending = self.state.lock().input.take();
        if let Some(pending) = pending {
            let _ = pending.reply.send(Some(value.into()));
            self.service.hide();
        }
    }

    /// UI hook: the widget was dismissed.
    pub fn close(&self) {
        let (pick, input) = {
            let mut state = self.state.lock();
            (state.pick.take(), state.input.take())
        };
        if let Some(pick) = pick {
            let _ = pick.reply.send(None);
        }
        if let Some(input) = input {
            let _ = input.reply.send(None);
        }
    }

    pub fn is_picking(&self) -> bool {
        self.state.lock().pick.is_some()
    }

    pub fn is_inputting(&self) -> bool {
        self.state.lock().input.is_some()
    }
}

#[async_trait::async_trait]
impl QuickOpenMain for QuickOpenMainImpl {
    async fn show(&self, options: PickOptions) -> CallResult<Option<Vec<u32>>> {
        let (tx, rx) = oneshot::channel();
        let (generation, previous, items) = {
            let mut state = self.state.lock();
            let generation = state.next_generation();
            let previous = state.pick.replace(PendingPick { generation, reply: tx });
            (generation, previous, state.items.clone())
        };
        if let Some(previous) = previous {
            let _ = previous.reply.send(None);
        }

        let mut guard = Abandoned { owner: self, generation, armed: true };
        self.service.open(&items, &options);
        let handles = rx.await.unwrap_or(None);
        guard.armed = false;
        Ok(handles)
    }

    async fn set_items(&self, items: Vec<PickOpenItem>) -> CallResult<()> {
        self.service.set_items(&items);
        self.state.lock().items = items;
        Ok(())
    }

    async fn set_error(&self, message: String) -> CallResult<()> {
        self.service.show_error(&message);
        Ok(())
    }

    async fn input(&self, options: InputBoxOptions, validate_input: bool) -> CallResult<Option<String>> {
        let (tx, rx) = oneshot::channel();
        let (generation, previous) = {
            let mut state = self.state.lock();
            let generation = state.next_generation();
            let previous = state.input.replace(PendingInput { generation, reply: tx, validate: validate_input });
            (generation, previous)
        };
        if let Some(previous) = previous {
            let _ = previous.reply.send(None);
        }

        let mut guard = Abandoned { owner: self, generation, armed: true };
        self.service.open_input(&options);
        let value = rx.await.unwrap_or(None);
        guard.armed = false;
        Ok(value)
    }
}
