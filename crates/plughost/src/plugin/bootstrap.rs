//! # Plugin Runtime Bootstrap
//!
//! Brings a plugin runtime from `Uninitialized` to `ApiInjected`:
//!
//! 1. wrap the transport in a `Peer` (`ChannelEstablished`);
//! 2. install the plugin API on it (`ApiInjected`);
//! 3. register `HostedPluginManagerExt` so the host can load plugins.
//!
//! `run_stdio` is the entry point of a child-process runtime; `spawn_worker` runs a
//! runtime on its own thread and hands back the host end of an in-process channel.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::channel::DuplexChannelTransport;
use crate::config::HostConfig;
use crate::ext::PluginApi;
use crate::logging;
use crate::peer::Peer;
use crate::plugin::host::BootstrapError;
use crate::plugin::host::HostedPluginManagerExtImpl;
use crate::plugin::host::PluginHost;
use crate::plugin::host::Result;
use crate::plugin::host::RuntimeState;
use crate::plugin::host::RuntimeStatus;
use crate::plugin::module::ModuleLoader;
use crate::protocol::ids;
use crate::protocol::interfaces::HostedPluginManagerExt;
use crate::stream::StreamTransport;
use crate::transport::Transport;

pub struct PluginHostBuilder {
    name: String,
    transport: Option<Box<dyn Transport>>,
    loader: Option<Arc<dyn ModuleLoader>>,
    config: HostConfig,
}

impl PluginHostBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), transport: None, loader: None, config: HostConfig::standard() }
    }

    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<PluginHostRuntime> {
        let transport = self.transport.ok_or(BootstrapError::MissingTransport)?;
        let loader = self.loader.ok_or(BootstrapError::MissingLoader)?;
        let status = Arc::new(RuntimeStatus::new());

        let peer = Arc::new(Peer::new(self.name, transport, &self.config));
        status.advance(RuntimeState::ChannelEstablished);

        let api = PluginApi::install(&peer, self.config.env.clone())?;
        status.advance(RuntimeState::ApiInjected);

        let host = Arc::new(PluginHost::new(api.clone(), loader, status.clone()));
        let handler: Arc<dyn HostedPluginManagerExt> = Arc::new(HostedPluginManagerExtImpl::new(host.clone()));
        peer.set(ids::HOSTED_PLUGIN_MANAGER_EXT, handler)?;

        Ok(PluginHostRuntime { status, api, host, peer })
    }
}

/// A bootstrapped plugin runtime.
pub struct PluginHostRuntime {
    status: Arc<RuntimeStatus>,
    api: Arc<PluginApi>,
    host: Arc<PluginHost>,
    peer: Arc<Peer>,
}

impl PluginHostRuntime {
    pub fn state(&self) -> RuntimeState {
        self.status.get()
    }

    pub fn status(&self) -> &Arc<RuntimeStatus> {
        &self.status
    }

    pub fn api(&self) -> &Arc<PluginApi> {
        &self.api
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    /// Waits for the host to hang up, then stops every remaining plugin.
    pub async fn run_until_closed(&self) {
        self.peer.closed().await;
        tracing::info!(peer = %self.peer.peer_name(), "channel closed, stopping plugins");
        self.host.stop_all().await;
    }
}

/// Child-process entry point: serves the host over stdin/stdout until it disconnects.
pub async fn run_stdio(loader: Arc<dyn ModuleLoader>, config: HostConfig) -> Result<()> {
    logging::init_logging(&config.log_filter);
    let transport = StreamTransport::stdio(config.max_frame_bytes);
    let runtime = PluginHostBuilder::new("plugin-host").transport(transport).loader(loader).config(config).build()?;
    runtime.run_until_closed().await;
    Ok(())
}

/// A plugin runtime running on its own thread.
pub struct WorkerHandle {
    transport: Option<DuplexChannelTransport>,
    thread: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    /// The host end of the channel. Returns `None` once taken.
    pub fn take_transport(&mut self) -> Option<DuplexChannelTransport> {
        self.transport.take()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the worker exits. The host end must be closed first.
    pub fn join(self) -> Result<()> {
        self.thread.join().map_err(|_| BootstrapError::Runtime("worker thread panicked".into()))?
    }
}

/// Starts a plugin runtime on a new OS thread with its own current-thread runtime.
pub fn spawn_worker(name: &str, loader: Arc<dyn ModuleLoader>, config: HostConfig) -> Result<WorkerHandle> {
    let (host_end, worker_end) = DuplexChannelTransport::pair();
    let name = name.to_string();
    let thread = std::thread::Builder::new().name(name.clone()).spawn(move || -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        runtime.block_on(async move {
            let host = PluginHostBuilder::new(name).transport(worker_end).loader(loader).config(config).build()?;
            host.run_until_closed().await;
            Ok::<(), BootstrapError>(())
        })
    })?;
    Ok(WorkerHandle { transport: Some(host_end), thread })
}
