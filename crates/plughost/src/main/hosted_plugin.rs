//! # Hosted Plugin Support
//!
//! The host's view of its plugin runtimes.
//!
//! - `HostedPluginSupport` owns one `Peer` and `MainContext` per connected runtime and
//!   drives its lifecycle through `HostedPluginManagerExt`.
//! - `HostedInstanceManager` starts, stops and restarts a separate hosted instance used
//!   for plugin development, reporting progress through a `MessageService`.
//!
//! ## Invariants
//!
//! - Host ids come from a counter and are never reused.
//! - One plugin failing to load never prevents the others from loading.
//! - User-facing failure messages carry only the text after the first `:` of the error.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use parking_lot::Mutex;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::config::HostConfig;
use crate::event::Emitter;
use crate::event::Subscription;
use crate::main::HostServices;
use crate::main::MainContext;
use crate::peer;
use crate::peer::Peer;
use crate::protocol::plugin::Plugin;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(u64);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host-{}", self.0)
    }
}

struct HostConnection {
    peer: Arc<Peer>,
    context: Arc<MainContext>,
}

/// Per-plugin outcome of `load_plugins`.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginLoadReport {
    pub plugin_id: String,
    pub result: CallResult<()>,
}

pub struct HostedPluginSupport {
    config: HostConfig,
    next_id: AtomicU64,
    hosts: DashMap<HostId, HostConnection>,
}

impl HostedPluginSupport {
    pub fn new(config: HostConfig) -> Self {
        Self { config, next_id: AtomicU64::new(1), hosts: DashMap::new() }
    }

    /// Wraps `transport` in a peer and installs the Main adapters on it.
    pub fn connect(&self, name: &str, transport: Box<dyn Transport>, services: HostServices) -> peer::Result<HostId> {
        let id = HostId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let peer = Arc::new(Peer::new(format!("{}:{}", name, id), transport, &self.config));
        let context = MainContext::install(&peer, services)?;
        self.hosts.insert(id, HostConnection { peer, context });
        tracing::info!(host = %id, name, "plugin host connected");
        Ok(id)
    }

    pub fn context(&self, id: HostId) -> Option<Arc<MainContext>> {
        self.hosts.get(&id).map(|c| c.context.clone())
    }

    pub fn peer(&self, id: HostId) -> Option<Arc<Peer>> {
        self.hosts.get(&id).map(|c| c.peer.clone())
    }

    pub fn hosts(&self) -> Vec<HostId> {
        let mut ids: Vec<HostId> = self.hosts.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    fn connected(&self, id: HostId) -> CallResult<Arc<MainContext>> {
        self.context(id).ok_or(FailureReason::Disconnected)
    }

    pub async fn initialize(&self, id: HostId, context_path: &str) -> CallResult<()> {
        let context = self.connected(id)?;
        context.plugin_manager.initialize(context_path.to_string()).await
    }

    /// Loads each plugin in order. Failures are logged and reported, never propagated.
    pub async fn load_plugins(&self, id: HostId, plugins: Vec<Plugin>) -> Vec<PluginLoadReport> {
        let context = self.context(id);
        let mut reports = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let plugin_id = plugin.id();
            let result = match &context {
                Some(context) => context.plugin_manager.load_plugin(plugin).await,
                None => Err(FailureReason::Disconnected),
            };
            match &result {
                Ok(()) => tracing::info!(host = %id, plugin = %plugin_id, "plugin loaded"),
                Err(e) => tracing::error!(host = %id, plugin = %plugin_id, error = %e, "plugin failed to load"),
            }
            reports.push(PluginLoadReport { plugin_id, result });
        }
        reports
    }

    pub async fn stop_plugins(&self, id: HostId, plugin_ids: Vec<String>) -> CallResult<()> {
        let context = self.connected(id)?;
        context.plugin_manager.stop_plugin(plugin_ids).await
    }

    /// Closes the connection. Returns `false` for an unknown id.
    pub fn disconnect(&self, id: HostId) -> bool {
        match self.hosts.remove(&id) {
            Some((_, connection)) => {
                connection.peer.close();
                tracing::info!(host = %id, "plugin host disconnected");
                true
            }
            None => false,
        }
    }
}

// ============================================================================
//  HOSTED INSTANCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostedInstanceState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// User notifications.
pub trait MessageService: Send + Sync {
    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);
}

/// Runs the hosted instance, typically a second host process.
#[async_trait::async_trait]
pub trait InstanceLauncher: Send + Sync {
    /// Starts an instance for the plugin at `location` and returns its URL.
    async fn run(&self, location: &str) -> anyhow::Result<String>;

    async fn terminate(&self) -> anyhow::Result<()>;

    async fn is_running(&self) -> bool;

    async fn is_plugin_valid(&self, location: &str) -> bool;
}

/// Everything after the first `:`, so `"Error: port in use"` reads `"port in use"`.
pub fn summarize_error(error: &anyhow::Error) -> String {
    let message = error.to_string();
    match message.split_once(':') {
        Some((_, rest)) => rest.trim_start().to_string(),
        None => message,
    }
}

pub struct HostedInstanceManager {
    config: HostConfig,
    launcher: Arc<dyn InstanceLauncher>,
    messages: Arc<dyn MessageService>,
    state: Mutex<HostedInstanceState>,
    location: Mutex<Option<String>>,
    instance_url: Mutex<Option<String>>,
    on_state_changed: Emitter<HostedInstanceState>,
}

impl HostedInstanceManager {
    pub fn new(config: HostConfig, launcher: Arc<dyn InstanceLauncher>, messages: Arc<dyn MessageService>) -> Self {
        Self {
            config,
            launcher,
            messages,
            state: Mutex::new(HostedInstanceState::Stopped),
            location: Mutex::new(None),
            instance_url: Mutex::new(None),
            on_state_changed: Emitter::new(),
        }
    }

    pub fn state(&self) -> HostedInstanceState {
        *self.state.lock()
    }

    pub fn instance_url(&self) -> Option<String> {
        self.instance_url.lock().clone()
    }

    pub fn on_state_changed(&self, listener: impl Fn(&HostedInstanceState) + Send + Sync + 'static) -> Subscription {
        self.on_state_changed.subscribe(listener)
    }

    fn set_state(&self, state: HostedInstanceState) {
        *self.state.lock() = state;
        tracing::info!(?state, "hosted instance state changed");
        self.on_state_changed.fire(&state);
    }

    /// Sets the plugin folder, if the launcher accepts it.
    pub async fn set_plugin_location(&self, location: &str) -> bool {
        if !self.launcher.is_plugin_valid(location).await {
            self.messages.error("Specified folder does not contain valid plugin.");
            return false;
        }
        *self.location.lock() = Some(location.to_string());
        self.messages.info(&format!("Plugin folder is set to: {}", location));
        true
    }

    pub async fn start(&self) {
        let Some(location) = self.location.lock().clone() else {
            self.messages.warn("No plugin folder selected.");
            return;
        };
        self.set_state(HostedInstanceState::Starting);
        self.messages.info("Starting hosted instance server ...");
        match self.launcher.run(&location).await {
            Ok(url) => self.running(url),
            Err(e) => {
                self.messages.error(&format!("Failed to run hosted plugin instance: {}", summarize_error(&e)));
                self.set_state(HostedInstanceState::Failed);
            }
        }
    }

    pub async fn stop(&self) {
        self.set_state(HostedInstanceState::Stopping);
        match self.launcher.terminate().await {
            Ok(()) => {
                let url = self.instance_url.lock().take();
                let what = url.unwrap_or_else(|| "The instance".to_string());
                self.messages.info(&format!("{} has been terminated.", what));
                self.set_state(HostedInstanceState::Stopped);
            }
            Err(e) => {
                self.messages.warn(&summarize_error(&e));
                self.set_state(HostedInstanceState::Failed);
            }
        }
    }

    /// Stops a running instance and starts it again, retrying while the old one
    /// releases its resources.
    pub async fn restart(&self) {
        if !self.launcher.is_running().await {
            self.messages.warn("Hosted Plugin instance is not running.");
            self.set_state(HostedInstanceState::Failed);
            return;
        }
        self.stop().await;

        let Some(location) = self.location.lock().clone() else {
            self.messages.warn("No plugin folder selected.");
            self.set_state(HostedInstanceState::Failed);
            return;
        };
        self.messages.info("Starting hosted instance server ...");
        self.set_state(HostedInstanceState::Starting);

        let mut last_error = None;
        for attempt in 0..self.config.restart_attempts {
            match self.launcher.run(&location).await {
                Ok(url) => {
                    self.running(url);
                    return;
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "hosted instance restart attempt failed");
                    last_error = Some(e);
                    tokio::time::sleep(self.config.restart_delay).await;
                }
            }
        }
        let reason = last_error.map(|e| summarize_error(&e)).unwrap_or_default();
        self.messages.error(&format!("Failed to run hosted plugin instance: {}", reason));
        self.set_state(HostedInstanceState::Failed);
    }

    fn running(&self, url: String) {
        self.messages.info(&format!("Hosted instance is running at: {}", url));
        *self.instance_url.lock() = Some(url);
        self.set_state(HostedInstanceState::Running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_summary_drops_prefix() {
        assert_eq!(summarize_error(&anyhow::anyhow!("Error: port in use")), "port in use");
        assert_eq!(summarize_error(&anyhow::anyhow!("a: b: c")), "b: c");
        assert_eq!(summarize_error(&anyhow::anyhow!("plain")), "plain");
    }

    #[test]
    fn test_host_id_display() {
        assert_eq!(HostId(3).to_string(), "host-3");
    }
}
