//! The shared contract: one declaration per RPC-reachable interface.
//!
//! `*Main` interfaces are implemented in the host and called by plugins. `*Ext`
//! interfaces are implemented in the plugin runtime and called by the host.

use plugrpc::Value;
use plugrpc::rpc_interface;

use crate::protocol::model::ApplyEditsOptions;
use crate::protocol::model::CommandDescriptor;
use crate::protocol::model::EditorChangedPropertiesData;
use crate::protocol::model::EditorsAndDocumentsDelta;
use crate::protocol::model::InputBoxOptions;
use crate::protocol::model::ModelChangedEvent;
use crate::protocol::model::PickOpenItem;
use crate::protocol::model::PickOptions;
use crate::protocol::model::SingleEditOperation;
use crate::protocol::model::TerminalCreationOptions;
use crate::protocol::model::TextEditorConfigurationUpdate;
use crate::protocol::model::TextEditorPositionData;
use crate::protocol::model::TextEditorRevealType;
use crate::protocol::model::WireRange;
use crate::protocol::model::WireSelection;
use crate::protocol::model::WorkspaceFoldersChangeEvent;
use crate::protocol::plugin::Plugin;

rpc_interface! {
    pub trait CommandRegistryMain: proxy CommandRegistryMainProxy, dispatch CommandRegistryMainDispatch {
        requests {
            fn execute_command(&self, id: String, args: Vec<Value>) -> Option<Value>;
            fn get_commands(&self) -> Vec<String>;
        }
        notifications {
            fn register_command(&self, command: CommandDescriptor);
            fn unregister_command(&self, id: String);
        }
    }
}

rpc_interface! {
    pub trait CommandRegistryExt: proxy CommandRegistryExtProxy, dispatch CommandRegistryExtDispatch {
        requests {
            fn execute_command(&self, id: String, args: Vec<Value>) -> Option<Value>;
        }
        notifications {}
    }
}

rpc_interface! {
    pub trait QuickOpenMain: proxy QuickOpenMainProxy, dispatch QuickOpenMainDispatch {
        requests {
            /// Resolves with the accepted handles, or `None` when the picker was closed.
            fn show(&self, options: PickOptions) -> Option<Vec<u32>>;
            fn set_items(&self, items: Vec<PickOpenItem>) -> ();
            fn set_error(&self, message: String) -> ();
            fn input(&self, options: InputBoxOptions, validate_input: bool) -> Option<String>;
        }
        notifications {}
    }
}

rpc_interface! {
    pub trait QuickOpenExt: proxy QuickOpenExtProxy, dispatch QuickOpenExtDispatch {
        requests {
            /// Returns an error message for invalid input.
            fn validate_input(&self, input: String) -> Option<String>;
        }
        notifications {
            fn on_item_selected(&self, handle: u32);
        }
    }
}

rpc_interface! {
    pub trait TerminalServiceMain: proxy TerminalServiceMainProxy, dispatch TerminalServiceMainDispatch {
        requests {
            fn create_terminal(&self, options: TerminalCreationOptions) -> u64;
        }
        notifications {
            fn send_text(&self, id: u64, text: String, add_new_line: bool);
            fn show(&self, id: u64, preserve_focus: bool);
            fn hide(&self, id: u64);
            fn dispose(&self, id: u64);
        }
    }
}

rpc_interface! {
    pub trait TerminalServiceExt: proxy TerminalServiceExtProxy, dispatch TerminalServiceExtDispatch {
        requests {}
        notifications {
            fn terminal_closed(&self, id: u64);
        }
    }
}

rpc_interface! {
    pub trait TextEditorsMain: proxy TextEditorsMainProxy, dispatch TextEditorsMainDispatch {
        requests {
            fn try_set_options(&self, id: String, options: TextEditorConfigurationUpdate) -> ();
            fn try_set_selections(&self, id: String, selections: Vec<WireSelection>) -> ();
            fn try_reveal_range(&self, id: String, range: WireRange, reveal_type: TextEditorRevealType) -> ();
            fn try_apply_edits(
                &self,
                id: String,
                model_version_id: u64,
                edits: Vec<SingleEditOperation>,
                options: ApplyEditsOptions
            ) -> bool;
        }
        notifications {}
    }
}

rpc_interface! {
    pub trait TextEditorsExt: proxy TextEditorsExtProxy, dispatch TextEditorsExtDispatch {
        requests {}
        notifications {
            fn accept_editor_properties_changed(&self, id: String, props: EditorChangedPropertiesData);
            fn accept_editor_position_data(&self, data: TextEditorPositionData);
        }
    }
}

rpc_interface! {
    pub trait DocumentsMain: proxy DocumentsMainProxy, dispatch DocumentsMainDispatch {
        requests {
            fn try_open_document(&self, uri: String) -> ();
            fn try_save_document(&self, uri: String) -> bool;
        }
        notifications {}
    }
}

rpc_interface! {
    pub trait DocumentsExt: proxy DocumentsExtProxy, dispatch DocumentsExtDispatch {
        requests {}
        notifications {
            fn accept_model_mode_changed(&self, uri: String, old_mode_id: String, new_mode_id: String);
            fn accept_model_saved(&self, uri: String);
            fn accept_dirty_state_changed(&self, uri: String, is_dirty: bool);
            fn accept_model_changed(&self, uri: String, event: ModelChangedEvent, is_dirty: bool);
        }
    }
}

rpc_interface! {
    pub trait EditorsAndDocumentsExt: proxy EditorsAndDocumentsExtProxy, dispatch EditorsAndDocumentsExtDispatch {
        requests {}
        notifications {
            fn accept_editors_and_documents_delta(&self, delta: EditorsAndDocumentsDelta);
        }
    }
}

rpc_interface! {
    pub trait HostedPluginManagerExt: proxy HostedPluginManagerExtProxy, dispatch HostedPluginManagerExtDispatch {
        requests {
            /// Runs the runtime's init script before any plugin loads.
            fn initialize(&self, context_path: String) -> ();
            fn load_plugin(&self, plugin: Plugin) -> ();
            /// Unknown or already stopped ids are skipped.
            fn stop_plugin(&self, plugin_ids: Vec<String>) -> ();
        }
        notifications {}
    }
}

rpc_interface! {
    pub trait WorkspaceExt: proxy WorkspaceExtProxy, dispatch WorkspaceExtDispatch {
        requests {}
        notifications {
            fn on_workspace_folders_changed(&self, event: WorkspaceFoldersChangeEvent);
        }
    }
}
