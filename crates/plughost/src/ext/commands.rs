//! Plugin-side command registry.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::BoxFuture;

use plugrpc::CallResult;
use plugrpc::FailureReason;
use plugrpc::Value;

use crate::event::Subscription;
use crate::protocol::interfaces::CommandRegistryExt;
use crate::protocol::interfaces::CommandRegistryMain;
use crate::protocol::model::CommandDescriptor;

pub type CommandHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Option<Value>>> + Send + Sync>;

/// Wraps an async closure as a `CommandHandler`.
pub fn command_handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

pub struct CommandRegistryExtImpl {
    proxy: Arc<dyn CommandRegistryMain>,
    commands: Arc<DashMap<String, CommandHandler>>,
}

impl CommandRegistryExtImpl {
    pub fn new(proxy: Arc<dyn CommandRegistryMain>) -> Self {
        Self { proxy, commands: Arc::new(DashMap::new()) }
    }

    /// Registers a plugin command and announces it to the host.
    ///
    /// Disposing the returned subscription unregisters it on both sides.
    pub fn register_command(&self, descriptor: CommandDescriptor, handler: CommandHandler) -> CallResult<Subscription> {
        let id = descriptor.id.clone();
        match self.commands.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(FailureReason::failed(format!("Command {} already exists", id)));
            }
            Entry::Vacant(slot) => {
                slot.insert(handler);
            }
        }
        self.proxy.register_command(descriptor);
        tracing::debug!(command = %id, "command registered");

        let commands = Arc::downgrade(&self.commands);
        let proxy = self.proxy.clone();
        Ok(Subscription::new(move || {
            if let Some(commands) = commands.upgrade() {
                if commands.remove(&id).is_some() {
                    proxy.unregister_command(id);
                }
            }
        }))
    }

    /// Runs a local command if there is one, otherwise asks the host.
    pub async fn execute_command(&self, id: &str, args: Vec<Value>) -> CallResult<Option<Value>> {
        match self.local(id) {
            Some(handler) => run(id, handler, args).await,
            None => self.proxy.execute_command(id.to_string(), args).await,
        }
    }

    pub async fn get_commands(&self) -> CallResult<Vec<String>> {
        self.proxy.get_commands().await
    }

    pub fn has_local(&self, id: &str) -> bool {
        self.commands.contains_key(id)
    }

    fn local(&self, id: &str) -> Option<CommandHandler> {
        self.commands.get(id).map(|h| h.value().clone())
    }
}

pub(crate) async fn run(id: &str, handler: CommandHandler, args: Vec<Value>) -> CallResult<Option<Value>> {
    handler(args).await.map_err(|e| {
        tracing::warn!(command = id, error = %e, "command failed");
        FailureReason::failed(format!("Command {} failed: {}", id, e))
    })
}

#[async_trait::async_trait]
impl CommandRegistryExt for CommandRegistryExtImpl {
    async fn execute_command(&self, id: String, args: Vec<Value>) -> CallResult<Option<Value>> {
        match self.local(&id) {
            Some(handler) => run(&id, handler, args).await,
            None => Err(FailureReason::failed(format!("Unknown command {}", id))),
        }
    }
}
