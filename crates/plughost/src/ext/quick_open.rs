//! Plugin-side quick pick and input box.
//!
//! The host shows one picker at a time, so the current item set and validator are
//! single slots. A cancelled pick drops the outstanding `$show` call, which cancels it
//! on the host.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use plugrpc::CallResult;

use crate::event::Emitter;
use crate::event::Subscription;
use crate::ext::convert;
use crate::ext::types::InputBoxOptions;
use crate::ext::types::QuickPickItem;
use crate::ext::types::QuickPickOptions;
use crate::protocol::interfaces::QuickOpenExt;
use crate::protocol::interfaces::QuickOpenMain;

pub type InputValidator = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct QuickOpenExtImpl {
    proxy: Arc<dyn QuickOpenMain>,
    items: Mutex<HashMap<u32, QuickPickItem>>,
    validator: Mutex<Option<InputValidator>>,
    on_did_select_item: Emitter<QuickPickItem>,
}

impl QuickOpenExtImpl {
    pub fn new(proxy: Arc<dyn QuickOpenMain>) -> Self {
        Self {
            proxy,
            items: Mutex::new(HashMap::new()),
            validator: Mutex::new(None),
            on_did_select_item: Emitter::new(),
        }
    }

    /// Resolves to the accepted item, or `None` if the picker was closed or `token` fired.
    pub async fn show_quick_pick(
        &self,
        items: Vec<QuickPickItem>,
        options: QuickPickOptions,
        token: Option<&CancellationToken>,
    ) -> CallResult<Option<QuickPickItem>> {
        let picked = self.pick(items, options, false, token).await?;
        Ok(picked.and_then(|mut items| (!items.is_empty()).then(|| items.remove(0))))
    }

    pub async fn show_quick_pick_many(
        &self,
        items: Vec<QuickPickItem>,
        options: QuickPickOptions,
        token: Option<&CancellationToken>,
    ) -> CallResult<Option<Vec<QuickPickItem>>> {
        self.pick(items, options, true, token).await
    }

    async fn pick(
        &self,
        items: Vec<QuickPickItem>,
        options: QuickPickOptions,
        can_select_many: bool,
        token: Option<&CancellationToken>,
    ) -> CallResult<Option<Vec<QuickPickItem>>> {
        let wire_items = items
            .iter()
            .enumerate()
            .map(|(handle, item)| convert::from_quick_pick_item(handle as u32, item))
            .collect();
        *self.items.lock() = items.into_iter().enumerate().map(|(handle, item)| (handle as u32, item)).collect();

        self.proxy.set_items(wire_items).await?;
        let options = convert::from_quick_pick_options(&options, can_select_many);

        let handles = tokio::select! {
            handles = self.proxy.show(options) => handles?,
            _ = cancelled(token) => {
                tracing::debug!("quick pick cancelled");
                None
            }
        };

        let items = self.items.lock();
        Ok(handles.map(|handles| handles.iter().filter_map(|handle| items.get(handle).cloned()).collect()))
    }

    /// Resolves to the entered text, or `None` if the box was dismissed or `token` fired.
    pub async fn show_input_box(
        &self,
        options: InputBoxOptions,
        validator: Option<InputValidator>,
        token: Option<&CancellationToken>,
    ) -> CallResult<Option<String>> {
        let validate = validator.is_some();
        *self.validator.lock() = validator;

        let outcome = tokio::select! {
            value = self.proxy.input(convert::from_input_box_options(&options), validate) => value,
            _ = cancelled(token) => Ok(None),
        };
        *self.validator.lock() = None;
        outcome
    }

    pub fn on_did_select_item(&self, listener: impl Fn(&QuickPickItem) + Send + Sync + 'static) -> Subscription {
        self.on_did_select_item.subscribe(listener)
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[async_trait::async_trait]
impl QuickOpenExt for QuickOpenExtImpl {
    async fn validate_input(&self, input: String) -> CallResult<Option<String>> {
        let validator = self.validator.lock().clone();
        Ok(validator.and_then(|validate| validate(&input)))
    }

    fn on_item_selected(&self, handle: u32) {
        let item = self.items.lock().get(&handle).cloned();
        match item {
            Some(item) => self.on_did_select_item.fire(&item),
            None => tracing::debug!(handle, "selection for unknown quick pick item"),
        }
    }
}
