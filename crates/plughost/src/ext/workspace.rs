//! Plugin-side workspace folder list.

use parking_lot::Mutex;

use crate::event::Emitter;
use crate::event::Subscription;
use crate::protocol::interfaces::WorkspaceExt;
use crate::protocol::model::WorkspaceFolder;
use crate::protocol::model::WorkspaceFoldersChangeEvent;

#[derive(Default)]
pub struct WorkspaceExtImpl {
    folders: Mutex<Vec<WorkspaceFolder>>,
    on_did_change_workspace_folders: Emitter<WorkspaceFoldersChangeEvent>,
}

impl WorkspaceExtImpl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folders ordered by their host index.
    pub fn workspace_folders(&self) -> Vec<WorkspaceFolder> {
        self.folders.lock().clone()
    }

    pub fn get_workspace_folder(&self, uri: &str) -> Option<WorkspaceFolder> {
        self.folders
            .lock()
            .iter()
            .filter(|folder| uri.starts_with(folder.uri.as_str()))
            .max_by_key(|folder| folder.uri.len())
            .cloned()
    }

    pub fn on_did_change_workspace_folders(
        &self,
        listener: impl Fn(&WorkspaceFoldersChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_workspace_folders.subscribe(listener)
    }
}

#[async_trait::async_trait]
impl WorkspaceExt for WorkspaceExtImpl {
    fn on_workspace_folders_changed(&self, event: WorkspaceFoldersChangeEvent) {
        {
            let mut folders = self.folders.lock();
            folders.retain(|folder| !event.removed.iter().any(|removed| removed.uri == folder.uri));
            for added in &event.added {
                if !folders.iter().any(|folder| folder.uri == added.uri) {
                    folders.push(added.clone());
                }
            }
            folders.sort_by_key(|folder| folder.index);
        }
        tracing::debug!(added = event.added.len(), removed = event.removed.len(), "workspace folders changed");
        self.on_did_change_workspace_folders.fire(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(uri: &str, index: u32) -> WorkspaceFolder {
        WorkspaceFolder { uri: uri.into(), name: uri.rsplit('/').next().unwrap_or_default().into(), index }
    }

    #[test]
    fn test_folder_changes_apply_in_index_order() {
        let workspace = WorkspaceExtImpl::new();
        workspace.on_workspace_folders_changed(WorkspaceFoldersChangeEvent {
            added: vec![folder("file:///b", 1), folder("file:///a", 0)],
            removed: vec![],
        });
        workspace.on_workspace_folders_changed(WorkspaceFoldersChangeEvent {
            added: vec![folder("file:///c", 2)],
            removed: vec![folder("file:///b", 1)],
        });

        let uris: Vec<String> = workspace.workspace_folders().into_iter().map(|f| f.uri).collect();
        assert_eq!(uris, vec!["file:///a", "file:///c"]);
        assert_eq!(
            workspace.get_workspace_folder("file:///c/src/main.rs").map(|f| f.index),
            Some(2)
        );
        assert!(workspace.get_workspace_folder("file:///z/x").is_none());
    }
}
