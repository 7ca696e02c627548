//! Host-side command registry.
//!
//! Host commands run in this process. Commands registered by the plugin side are only
//! descriptors here; executing one is a call back through `CommandRegistryExt`.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use plugrpc::CallResult;
use plugrpc::FailureReason;
use plugrpc::Value;

use crate::event::Subscription;
use crate::ext::commands;
use crate::ext::commands::CommandHandler;
use crate::protocol::interfaces::CommandRegistryExt;
use crate::protocol::interfaces::CommandRegistryMain;
use crate::protocol::model::CommandDescriptor;

pub struct CommandRegistryMainImpl {
    proxy: Arc<dyn CommandRegistryExt>,
    host_commands: Arc<DashMap<String, CommandHandler>>,
    plugin_commands: DashMap<String, CommandDescriptor>,
}

impl CommandRegistryMainImpl {
    pub fn new(proxy: Arc<dyn CommandRegistryExt>) -> Self {
        Self { proxy, host_commands: Arc::new(DashMap::new()), plugin_commands: DashMap::new() }
    }

    /// Registers a command implemented by the host.
    pub fn register_host_command(&self, id: impl Into<String>, handler: CommandHandler) -> CallResult<Subscription> {
        let id = id.into();
        if self.plugin_commands.contains_key(&id) {
            return Err(FailureReason::failed(format!("Command {} already exists", id)));
        }
        match self.host_commands.entry(id.clone()) {
            Entry::Occupied(_) => return Err(FailureReason::failed(format!("Command {} already exists", id))),
            Entry::Vacant(slot) => {
                slot.insert(handler);
            }
        }
        let host_commands = Arc::downgrade(&self.host_commands);
        Ok(Subscription::new(move || {
            if let Some(host_commands) = host_commands.upgrade() {
                host_commands.remove(&id);
            }
        }))
    }

    pub fn plugin_command(&self, id: &str) -> Option<CommandDescriptor> {
        self.plugin_commands.get(id).map(|d| d.value().clone())
    }
}

#[async_trait::async_trait]
impl CommandRegistryMain for CommandRegistryMainImpl {
    async fn execute_command(&self, id: String, args: Vec<Value>) -> CallResult<Option<Value>> {
        let host = self.host_commands.get(&id).map(|h| h.value().clone());
        if let Some(handler) = host {
            return commands::run(&id, handler, args).await;
        }
        if self.plugin_commands.contains_key(&id) {
            return self.proxy.execute_command(id, args).await;
        }
        Err(FailureReason::failed(format!("Unknown command {}", id)))
    }

    async fn get_commands(&self) -> CallResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .host_commands
            .iter()
            .map(|e| e.key().clone())
            .chain(self.plugin_commands.iter().map(|e| e.key().clone()))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn register_command(&self, command: CommandDescriptor) {
        if self.host_commands.contains_key(&command.id) {
            tracing::warn!(command = %command.id, "plugin command shadows a host command, ignored");
            return;
        }
        tracing::debug!(command = %command.id, "plugin command registered");
        self.plugin_commands.insert(command.id.clone(), command);
    }

    fn unregister_command(&self, id: String) {
        if self.plugin_commands.remove(&id).is_none() {
            tracing::debug!(command = %id, "unregister for unknown command ignored");
        }
    }
}
