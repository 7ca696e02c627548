//! # Plugin Runtime
//!
//! The plugin side of a connection: bootstrap, module loading and the lifecycle of
//! each plugin.

pub mod bootstrap;
pub mod host;
pub mod module;

pub use bootstrap::PluginHostBuilder;
pub use bootstrap::PluginHostRuntime;
pub use bootstrap::WorkerHandle;
pub use bootstrap::run_stdio;
pub use bootstrap::spawn_worker;
pub use host::BootstrapError;
pub use host::PluginHost;
pub use host::PluginState;
pub use host::RuntimeState;
pub use module::ModuleExports;
pub use module::ModuleLoader;
pub use module::ModuleScope;
pub use module::PluginContext;
pub use module::StaticModuleLoader;
