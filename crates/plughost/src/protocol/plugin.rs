//! Plugin metadata, as produced by an external scanner and sent with `$load_plugin`.

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineType {
    TheiaPlugin,
    Vscode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEngine {
    #[serde(rename = "type")]
    pub kind: EngineType,
    pub version: String,
}

/// Entry module paths. A plugin may have one or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginEntryPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// Immutable description of a discovered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginModel {
    pub name: String,
    pub publisher: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub engine: PluginEngine,
    pub entry_point: PluginEntryPoint,
}

impl PluginModel {
    /// Registry key for start/stop bookkeeping: `publisher_name`.
    pub fn plugin_id(&self) -> String {
        format!("{}_{}", self.publisher, self.name)
    }

    /// Human-facing identity: `publisher.name-version`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}-{}", self.publisher, self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginLifecycle {
    pub start_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_init_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_init_path: Option<String>,
}

impl Default for PluginLifecycle {
    fn default() -> Self {
        Self {
            start_method: "start".into(),
            stop_method: Some("stop".into()),
            frontend_module_name: None,
            frontend_init_path: None,
            backend_init_path: None,
        }
    }
}

/// A plugin as handed to a runtime. Built once by the host and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    pub plugin_path: String,
    pub model: PluginModel,
    pub lifecycle: PluginLifecycle,
}

impl Plugin {
    pub fn id(&self) -> String {
        self.model.plugin_id()
    }
}
