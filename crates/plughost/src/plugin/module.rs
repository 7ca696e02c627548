//! # Plugin Modules
//!
//! A plugin's code is reached through a `ModuleLoader`, which turns a `Plugin` into the
//! named entry points it exports. The API object is handed over two ways: explicitly in
//! the `PluginContext` every entry point receives, and through `ModuleScope::require`
//! for code that resolves it by its well-known module name.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::ext::PluginApi;
use crate::protocol::plugin::Plugin;

/// Module names that resolve to the plugin API.
pub const PLUGIN_API_MODULES: &[&str] = &["@theia/plugin", "@wiptheia/plugin"];

/// What an entry point receives when it is invoked.
#[derive(Clone)]
pub struct PluginContext {
    pub api: Arc<PluginApi>,
    pub plugin: Plugin,
}

pub type EntryPoint = Arc<dyn Fn(PluginContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// The functions one loaded plugin module exports, by name.
#[derive(Clone, Default)]
pub struct ModuleExports {
    functions: HashMap<String, EntryPoint>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(PluginContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let entry: EntryPoint = Arc::new(move |context| f(context).boxed());
        self.functions.insert(name.into(), entry);
        self
    }

    pub fn get(&self, name: &str) -> Option<EntryPoint> {
        self.functions.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Module resolution visible to plugin code.
#[derive(Clone)]
pub struct ModuleScope {
    api: Arc<PluginApi>,
}

impl ModuleScope {
    pub fn new(api: Arc<PluginApi>) -> Self {
        Self { api }
    }

    /// Resolves the plugin API by module name. Every name resolves to the same instance.
    pub fn require(&self, name: &str) -> Option<Arc<PluginApi>> {
        PLUGIN_API_MODULES.contains(&name).then(|| self.api.clone())
    }
}

#[async_trait::async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Runs a one-off script, such as the context script of `$initialize`.
    async fn run_script(&self, path: &str, scope: &ModuleScope) -> anyhow::Result<()>;

    /// Loads `plugin`. Each call must produce a fresh set of exports.
    async fn load(&self, plugin: &Plugin, scope: &ModuleScope) -> anyhow::Result<ModuleExports>;
}

pub type ModuleFactory = Arc<dyn Fn(&ModuleScope) -> anyhow::Result<ModuleExports> + Send + Sync>;

pub type ScriptFactory = Arc<dyn Fn(&ModuleScope) -> anyhow::Result<()> + Send + Sync>;

/// A loader over modules compiled into the binary, keyed by `plugin_path`.
#[derive(Default)]
pub struct StaticModuleLoader {
    modules: DashMap<String, ModuleFactory>,
    scripts: DashMap<String, ScriptFactory>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(
        self,
        path: impl Into<String>,
        factory: impl Fn(&ModuleScope) -> anyhow::Result<ModuleExports> + Send + Sync + 'static,
    ) -> Self {
        self.modules.insert(path.into(), Arc::new(factory));
        self
    }

    pub fn script(
        self,
        path: impl Into<String>,
        script: impl Fn(&ModuleScope) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.scripts.insert(path.into(), Arc::new(script));
        self
    }
}

#[async_trait::async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn run_script(&self, path: &str, scope: &ModuleScope) -> anyhow::Result<()> {
        let script = self.scripts.get(path).map(|s| s.value().clone());
        match script {
            Some(script) => script(scope),
            None => Err(anyhow::anyhow!("Cannot find script '{}'", path)),
        }
    }

    async fn load(&self, plugin: &Plugin, scope: &ModuleScope) -> anyhow::Result<ModuleExports> {
        let factory = self.modules.get(&plugin.plugin_path).map(|f| f.value().clone());
        match factory {
            Some(factory) => factory(scope),
            None => Err(anyhow::anyhow!("Cannot find module '{}'", plugin.plugin_path)),
        }
    }
}
