//! # Plugin Host
//!
//! Loads, starts and stops the plugins of one runtime.
//!
//! ## Invariants
//!
//! - A plugin id is loaded at most once while it is loading or running.
//! - A failing or panicking plugin is recorded as `Failed` and reported to the caller;
//!   the other plugins are unaffected.
//! - Every stop function runs at most once: it is removed from the registry before it
//!   is invoked.
//! - Load and stop run to completion on their own task. A cancelled request only stops
//!   waiting for them, so a plugin never stays `Loading`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use parking_lot::Mutex;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::event::Emitter;
use crate::event::Subscription;
use crate::ext::PluginApi;
use crate::peer::PeerError;
use crate::peer::panic_message;
use crate::plugin::module::EntryPoint;
use crate::plugin::module::ModuleLoader;
use crate::plugin::module::ModuleScope;
use crate::plugin::module::PluginContext;
use crate::protocol::interfaces::HostedPluginManagerExt;
use crate::protocol::plugin::Plugin;

#[derive(Debug)]
pub enum BootstrapError {
    /// The builder was not given a transport.
    MissingTransport,
    /// The builder was not given a module loader.
    MissingLoader,
    /// A plugin with this id is already loading or running.
    AlreadyLoaded(String),
    /// The plugin could not be loaded or started.
    PluginFailed { plugin: String, message: String },
    Script(String),
    Peer(PeerError),
    Runtime(String),
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTransport => write!(f, "No transport configured"),
            Self::MissingLoader => write!(f, "No module loader configured"),
            Self::AlreadyLoaded(id) => write!(f, "Plugin {} is already loaded", id),
            Self::PluginFailed { plugin, message } => write!(f, "Plugin {} failed: {}", plugin, message),
            Self::Script(msg) => write!(f, "Init script failed: {}", msg),
            Self::Peer(e) => write!(f, "Peer error: {}", e),
            Self::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for BootstrapError {}

impl From<PeerError> for BootstrapError {
    fn from(e: PeerError) -> Self {
        Self::Peer(e)
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(e: std::io::Error) -> Self {
        Self::Runtime(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Lifecycle of one plugin runtime, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RuntimeState {
    Uninitialized,
    ChannelEstablished,
    ApiInjected,
    PluginLoading,
    Running,
    Stopped,
}

/// The current `RuntimeState`, shared by the bootstrap and the plugin host.
pub struct RuntimeStatus {
    state: Mutex<RuntimeState>,
    on_change: Emitter<RuntimeState>,
}

impl RuntimeStatus {
    pub fn new() -> Self {
        Self { state: Mutex::new(RuntimeState::Uninitialized), on_change: Emitter::new() }
    }

    pub fn get(&self) -> RuntimeState {
        *self.state.lock()
    }

    /// Moves forward to `to`. Never moves backwards; returns whether the state changed.
    pub fn advance(&self, to: RuntimeState) -> bool {
        let from = {
            let mut state = self.state.lock();
            if *state >= to {
                return false;
            }
            std::mem::replace(&mut *state, to)
        };
        tracing::info!(?from, ?to, "plugin runtime state changed");
        self.on_change.fire(&to);
        true
    }

    pub fn on_change(&self, listener: impl Fn(&RuntimeState) + Send + Sync + 'static) -> Subscription {
        self.on_change.subscribe(listener)
    }
}

impl Default for RuntimeStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginState {
    Loading,
    Running,
    Failed(String),
    Stopped,
}

struct StopEntry {
    stop: EntryPoint,
    plugin: Plugin,
}

pub struct PluginHost {
    api: Arc<PluginApi>,
    loader: Arc<dyn ModuleLoader>,
    status: Arc<RuntimeStatus>,
    plugins: DashMap<String, PluginState>,
    stops: DashMap<String, StopEntry>,
}

impl PluginHost {
    pub fn new(api: Arc<PluginApi>, loader: Arc<dyn ModuleLoader>, status: Arc<RuntimeStatus>) -> Self {
        Self { api, loader, status, plugins: DashMap::new(), stops: DashMap::new() }
    }

    pub fn api(&self) -> &Arc<PluginApi> {
        &self.api
    }

    pub fn plugin_state(&self, id: &str) -> Option<PluginState> {
        self.plugins.get(id).map(|s| s.value().clone())
    }

    /// Ids of plugins with a pending stop function.
    pub fn stoppable(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stops.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn scope(&self) -> ModuleScope {
        ModuleScope::new(self.api.clone())
    }

    /// Runs the context script before any plugin is loaded.
    pub async fn initialize(&self, context_path: &str) -> Result<()> {
        tracing::info!(context = context_path, "initializing plugin host");
        let scope = self.scope();
        AssertUnwindSafe(self.loader.run_script(context_path, &scope))
            .catch_unwind()
            .await
            .map_err(|payload| BootstrapError::Script(panic_message(&*payload)))?
            .map_err(|e| BootstrapError::Script(e.to_string()))
    }

    pub async fn load(&self, plugin: Plugin) -> Result<()> {
        let id = plugin.id();
        match self.plugins.entry(id.clone()) {
            Entry::Occupied(mut slot) => {
                if matches!(slot.get(), PluginState::Loading | PluginState::Running) {
                    tracing::warn!(plugin = %id, "plugin already loaded");
                    return Err(BootstrapError::AlreadyLoaded(id));
                }
                slot.insert(PluginState::Loading);
            }
            Entry::Vacant(slot) => {
                slot.insert(PluginState::Loading);
            }
        }
        self.status.advance(RuntimeState::PluginLoading);

        let outcome = self.load_and_start(&plugin).await;
        match &outcome {
            Ok(()) => {
                self.plugins.insert(id.clone(), PluginState::Running);
                tracing::info!(plugin = %id, "plugin started");
            }
            Err(message) => {
                self.plugins.insert(id.clone(), PluginState::Failed(message.clone()));
                tracing::error!(plugin = %id, error = %message, "plugin failed");
            }
        }
        self.status.advance(RuntimeState::Running);
        outcome.map_err(|message| BootstrapError::PluginFailed { plugin: id, message })
    }

    async fn load_and_start(&self, plugin: &Plugin) -> std::result::Result<(), String> {
        let id = plugin.id();
        let scope = self.scope();
        let exports = AssertUnwindSafe(self.loader.load(plugin, &scope))
            .catch_unwind()
            .await
            .map_err(|payload| format!("load panicked: {}", panic_message(&*payload)))?
            .map_err(|e| e.to_string())?;

        let context = PluginContext { api: self.api.clone(), plugin: plugin.clone() };
        match exports.get(&plugin.lifecycle.start_method) {
            Some(start) => invoke(start, context).await?,
            None => tracing::info!(plugin = %id, method = %plugin.lifecycle.start_method, "no start method"),
        }

        if let Some(stop) = plugin.lifecycle.stop_method.as_deref().and_then(|name| exports.get(name)) {
            self.stops.insert(id, StopEntry { stop, plugin: plugin.clone() });
        }
        Ok(())
    }

    /// Stops each listed plugin that has a stop function. Unknown ids are skipped.
    pub async fn stop_plugins(&self, ids: &[String]) {
        for id in ids {
            let Some((_, entry)) = self.stops.remove(id) else {
                tracing::debug!(plugin = %id, "nothing to stop");
                continue;
            };
            let context = PluginContext { api: self.api.clone(), plugin: entry.plugin };
            match invoke(entry.stop, context).await {
                Ok(()) => tracing::info!(plugin = %id, "plugin stopped"),
                Err(message) => tracing::error!(plugin = %id, error = %message, "plugin stop failed"),
            }
            if let Some(mut state) = self.plugins.get_mut(id) {
                *state = PluginState::Stopped;
            }
        }
    }

    /// Stops every remaining plugin and ends the runtime.
    pub async fn stop_all(&self) {
        let ids = self.stoppable();
        self.stop_plugins(&ids).await;
        for mut state in self.plugins.iter_mut() {
            if *state == PluginState::Running {
                *state = PluginState::Stopped;
            }
        }
        self.status.advance(RuntimeState::Stopped);
    }
}

async fn invoke(entry: EntryPoint, context: PluginContext) -> std::result::Result<(), String> {
    match AssertUnwindSafe(entry(context)).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
    }
}

/// Answers the host's lifecycle requests.
pub struct HostedPluginManagerExtImpl {
    host: Arc<PluginHost>,
}

impl HostedPluginManagerExtImpl {
    pub fn new(host: Arc<PluginHost>) -> Self {
        Self { host }
    }
}

#[async_trait::async_trait]
impl HostedPluginManagerExt for HostedPluginManagerExtImpl {
    async fn initialize(&self, context_path: String) -> CallResult<()> {
        self.host.initialize(&context_path).await.map_err(|e| FailureReason::failed(e.to_string()))
    }

    async fn load_plugin(&self, plugin: Plugin) -> CallResult<()> {
        let host = self.host.clone();
        tokio::spawn(async move { host.load(plugin).await })
            .await
            .map_err(|e| FailureReason::failed(format!("plugin load task failed: {}", e)))?
            .map_err(|e| FailureReason::failed(e.to_string()))
    }

    async fn stop_plugin(&self, plugin_ids: Vec<String>) -> CallResult<()> {
        let host = self.host.clone();
        tokio::spawn(async move { host.stop_plugins(&plugin_ids).await })
            .await
            .map_err(|e| FailureReason::failed(format!("plugin stop task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_state_only_moves_forward() {
        let status = RuntimeStatus::new();
        assert!(status.advance(RuntimeState::ChannelEstablished));
        assert!(status.advance(RuntimeState::ApiInjected));
        assert!(!status.advance(RuntimeState::ChannelEstablished));
        assert!(!status.advance(RuntimeState::ApiInjected));
        assert_eq!(status.get(), RuntimeState::ApiInjected);
    }
}
