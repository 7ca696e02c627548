//! The contract table. Both processes compile against this exact set.

use plugrpc::ProxyIdentifier;

use crate::protocol::interfaces::CommandRegistryExt;
use crate::protocol::interfaces::CommandRegistryMain;
use crate::protocol::interfaces::DocumentsExt;
use crate::protocol::interfaces::DocumentsMain;
use crate::protocol::interfaces::EditorsAndDocumentsExt;
use crate::protocol::interfaces::HostedPluginManagerExt;
use crate::protocol::interfaces::QuickOpenExt;
use crate::protocol::interfaces::QuickOpenMain;
use crate::protocol::interfaces::TerminalServiceExt;
use crate::protocol::interfaces::TerminalServiceMain;
use crate::protocol::interfaces::TextEditorsExt;
use crate::protocol::interfaces::TextEditorsMain;
use crate::protocol::interfaces::WorkspaceExt;

// Implemented in the host, called by plugins.
pub const COMMAND_REGISTRY_MAIN: ProxyIdentifier<dyn CommandRegistryMain> =
    ProxyIdentifier::new("CommandRegistryMain");
pub const QUICK_OPEN_MAIN: ProxyIdentifier<dyn QuickOpenMain> = ProxyIdentifier::new("QuickOpenMain");
pub const TERMINAL_SERVICE_MAIN: ProxyIdentifier<dyn TerminalServiceMain> =
    ProxyIdentifier::new("TerminalServiceMain");
pub const TEXT_EDITORS_MAIN: ProxyIdentifier<dyn TextEditorsMain> = ProxyIdentifier::new("TextEditorsMain");
pub const DOCUMENTS_MAIN: ProxyIdentifier<dyn DocumentsMain> = ProxyIdentifier::new("DocumentsMain");

// Implemented in the plugin runtime, called by the host.
pub const COMMAND_REGISTRY_EXT: ProxyIdentifier<dyn CommandRegistryExt> =
    ProxyIdentifier::new("CommandRegistryExt");
pub const QUICK_OPEN_EXT: ProxyIdentifier<dyn QuickOpenExt> = ProxyIdentifier::new("QuickOpenExt");
pub const TERMINAL_SERVICE_EXT: ProxyIdentifier<dyn TerminalServiceExt> =
    ProxyIdentifier::new("TerminalServiceExt");
pub const TEXT_EDITORS_EXT: ProxyIdentifier<dyn TextEditorsExt> = ProxyIdentifier::new("TextEditorsExt");
pub const DOCUMENTS_EXT: ProxyIdentifier<dyn DocumentsExt> = ProxyIdentifier::new("DocumentsExt");
pub const EDITORS_AND_DOCUMENTS_EXT: ProxyIdentifier<dyn EditorsAndDocumentsExt> =
    ProxyIdentifier::new("EditorsAndDocumentsExt");
pub const HOSTED_PLUGIN_MANAGER_EXT: ProxyIdentifier<dyn HostedPluginManagerExt> =
    ProxyIdentifier::new("HostedPluginManagerExt");
pub const WORKSPACE_EXT: ProxyIdentifier<dyn WorkspaceExt> = ProxyIdentifier::new("WorkspaceExt");

pub const MAIN_IDENTIFIERS: &[&str] = &[
    COMMAND_REGISTRY_MAIN.id(),
    QUICK_OPEN_MAIN.id(),
    TERMINAL_SERVICE_MAIN.id(),
    TEXT_EDITORS_MAIN.id(),
    DOCUMENTS_MAIN.id(),
];

pub const EXT_IDENTIFIERS: &[&str] = &[
    COMMAND_REGISTRY_EXT.id(),
    QUICK_OPEN_EXT.id(),
    TERMINAL_SERVICE_EXT.id(),
    TEXT_EDITORS_EXT.id(),
    DOCUMENTS_EXT.id(),
    EDITORS_AND_DOCUMENTS_EXT.id(),
    HOSTED_PLUGIN_MANAGER_EXT.id(),
    WORKSPACE_EXT.id(),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_identifiers_are_unique() {
        let all: Vec<&str> = MAIN_IDENTIFIERS.iter().chain(EXT_IDENTIFIERS).copied().collect();
        let unique: HashSet<&str> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_side_suffixes() {
        assert!(MAIN_IDENTIFIERS.iter().all(|id| id.ends_with("Main")));
        assert!(EXT_IDENTIFIERS.iter().all(|id| id.ends_with("Ext")));
    }
}
