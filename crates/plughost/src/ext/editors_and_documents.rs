//! # Editors and Documents Mirror
//!
//! Applies `EditorsAndDocumentsDelta`s, the only messages that change which documents
//! and editors the plugin side knows about.
//!
//! ## Invariants
//!
//! - A delta is applied in a fixed order: removed editors, removed documents, added
//!   documents, added editors, active editor.
//! - No editor exists without its document. Removing a document evicts its editors and
//!   an added editor whose document is unknown is dropped.
//! - Applying a delta twice leaves the same state and fires nothing the second time.
//!   Events fire only for effective changes, after the state update is complete.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::Emitter;
use crate::event::Subscription;
use crate::ext::convert;
use crate::ext::documents::DocumentDataExt;
use crate::ext::text_editor::TextEditorExt;
use crate::protocol::interfaces::EditorsAndDocumentsExt;
use crate::protocol::interfaces::TextEditorsMain;
use crate::protocol::model::EditorsAndDocumentsDelta;

#[derive(Default)]
struct Registry {
    documents: HashMap<String, Arc<DocumentDataExt>>,
    // Kept in the order the host added them.
    editors: Vec<Arc<TextEditorExt>>,
    active_editor: Option<String>,
}

impl Registry {
    fn editor(&self, id: &str) -> Option<&Arc<TextEditorExt>> {
        self.editors.iter().find(|e| e.id() == id)
    }

    fn remove_editor(&mut self, id: &str) -> Option<Arc<TextEditorExt>> {
        let index = self.editors.iter().position(|e| e.id() == id)?;
        Some(self.editors.remove(index))
    }
}

/// What one delta actually changed.
#[derive(Default)]
struct Applied {
    added_documents: Vec<Arc<DocumentDataExt>>,
    removed_documents: Vec<Arc<DocumentDataExt>>,
    editors_changed: bool,
    active_changed: bool,
}

pub struct EditorsAndDocumentsExtImpl {
    proxy: Arc<dyn TextEditorsMain>,
    registry: Mutex<Registry>,
    on_did_add_documents: Emitter<Vec<Arc<DocumentDataExt>>>,
    on_did_remove_documents: Emitter<Vec<Arc<DocumentDataExt>>>,
    on_did_change_visible_text_editors: Emitter<Vec<Arc<TextEditorExt>>>,
    on_did_change_active_text_editor: Emitter<Option<Arc<TextEditorExt>>>,
}

impl EditorsAndDocumentsExtImpl {
    pub fn new(proxy: Arc<dyn TextEditorsMain>) -> Self {
        Self {
            proxy,
            registry: Mutex::new(Registry::default()),
            on_did_add_documents: Emitter::new(),
            on_did_remove_documents: Emitter::new(),
            on_did_change_visible_text_editors: Emitter::new(),
            on_did_change_active_text_editor: Emitter::new(),
        }
    }

    pub fn get_document(&self, uri: &str) -> Option<Arc<DocumentDataExt>> {
        self.registry.lock().documents.get(uri).cloned()
    }

    pub fn all_documents(&self) -> Vec<Arc<DocumentDataExt>> {
        self.registry.lock().documents.values().cloned().collect()
    }

    pub fn get_editor(&self, id: &str) -> Option<Arc<TextEditorExt>> {
        self.registry.lock().editor(id).cloned()
    }

    pub fn all_editors(&self) -> Vec<Arc<TextEditorExt>> {
        self.registry.lock().editors.clone()
    }

    pub fn active_editor(&self) -> Option<Arc<TextEditorExt>> {
        let registry = self.registry.lock();
        registry.active_editor.as_deref().and_then(|id| registry.editor(id)).cloned()
    }

    pub fn on_did_add_documents(
        &self,
        listener: impl Fn(&Vec<Arc<DocumentDataExt>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_add_documents.subscribe(listener)
    }

    pub fn on_did_remove_documents(
        &self,
        listener: impl Fn(&Vec<Arc<DocumentDataExt>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_remove_documents.subscribe(listener)
    }

    pub fn on_did_change_visible_text_editors(
        &self,
        listener: impl Fn(&Vec<Arc<TextEditorExt>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_visible_text_editors.subscribe(listener)
    }

    pub fn on_did_change_active_text_editor(
        &self,
        listener: impl Fn(&Option<Arc<TextEditorExt>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_active_text_editor.subscribe(listener)
    }

    pub fn apply(&self, delta: EditorsAndDocumentsDelta) {
        let applied = self.apply_to_registry(delta);

        if !applied.removed_documents.is_empty() {
            self.on_did_remove_documents.fire(&applied.removed_documents);
        }
        if !applied.added_documents.is_empty() {
            self.on_did_add_documents.fire(&applied.added_documents);
        }
        if applied.editors_changed {
            self.on_did_change_visible_text_editors.fire(&self.all_editors());
        }
        if applied.active_changed {
            self.on_did_change_active_text_editor.fire(&self.active_editor());
        }
    }

    fn apply_to_registry(&self, delta: EditorsAndDocumentsDelta) -> Applied {
        let mut applied = Applied::default();
        let mut registry = self.registry.lock();
        let previous_active = registry.active_editor.clone();

        for id in &delta.removed_editors {
            if let Some(editor) = registry.remove_editor(id) {
                editor.dispose();
                applied.editors_changed = true;
            }
        }

        for uri in &delta.removed_documents {
            let Some(document) = registry.documents.remove(uri) else { continue };
            let orphans: Vec<String> = registry
                .editors
                .iter()
                .filter(|e| e.document().uri() == uri.as_str())
                .map(|e| e.id().to_string())
                .collect();
            for id in orphans {
                if let Some(editor) = registry.remove_editor(&id) {
                    tracing::debug!(editor = %id, uri = %uri, "evicting editor of removed document");
                    editor.dispose();
                    applied.editors_changed = true;
                }
            }
            document.dispose();
            applied.removed_documents.push(document);
        }

        for data in delta.added_documents {
            if registry.documents.contains_key(&data.uri) {
                continue;
            }
            let document = Arc::new(DocumentDataExt::new(data));
            registry.documents.insert(document.uri().to_string(), document.clone());
            applied.added_documents.push(document);
        }

        for data in delta.added_editors {
            if registry.editor(&data.id).is_some() {
                continue;
            }
            let Some(document) = registry.documents.get(&data.document_uri).cloned() else {
                tracing::error!(editor = %data.id, uri = %data.document_uri, "editor references unknown document, dropped");
                continue;
            };
            let editor = TextEditorExt::new(
                data.id,
                self.proxy.clone(),
                document,
                data.selections.into_iter().map(convert::to_selection).collect(),
                data.options,
                data.visible_ranges.into_iter().map(convert::to_range).collect(),
                data.editor_position.and_then(convert::to_view_column),
            );
            registry.editors.push(Arc::new(editor));
            applied.editors_changed = true;
        }

        if let Some(active) = delta.new_active_editor {
            let active = match active {
                Some(id) if registry.editor(&id).is_none() => {
                    tracing::warn!(editor = %id, "active editor is unknown");
                    None
                }
                other => other,
            };
            registry.active_editor = active;
        }
        // An active editor that was just removed is no longer active.
        if let Some(id) = registry.active_editor.clone() {
            if registry.editor(&id).is_none() {
                registry.active_editor = None;
            }
        }
        applied.active_changed = registry.active_editor != previous_active;
        applied
    }
}

#[async_trait::async_trait]
impl EditorsAndDocumentsExt for EditorsAndDocumentsExtImpl {
    fn accept_editors_and_documents_delta(&self, delta: EditorsAndDocumentsDelta) {
        self.apply(delta);
    }
}
