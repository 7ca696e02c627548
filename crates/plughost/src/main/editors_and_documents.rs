//! # Host Editor and Document Registry
//!
//! The host's record of open documents, open editors and the active editor. The host
//! UI describes what happened as a `HostStateChange`; `apply` validates it, updates the
//! registry and publishes exactly one `$accept_editors_and_documents_delta`.
//!
//! ## Invariants
//!
//! - An editor is only added for a document that is known once the change is applied.
//! - Removing a document removes its editors too, and they are listed in the delta.
//! - Removing something unknown or adding something already known is skipped, so the
//!   delta only describes effective changes. An empty delta is never sent.
//! - The delta goes out before the host-side events fire, so anything a listener sends
//!   about a new editor reaches the plugin side after the editor itself.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::Emitter;
use crate::event::Subscription;
use crate::main::text_editor::TextEditorMain;
use crate::protocol::interfaces::EditorsAndDocumentsExt;
use crate::protocol::model::EditorsAndDocumentsDelta;
use crate::protocol::model::ModelAddedData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An added editor refers to a document that is not open.
    UnknownDocument(String),
    /// The new active editor is not open.
    UnknownActiveEditor(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::UnknownDocument(uri) => write!(f, "Unknown document: {}", uri),
            RegistryError::UnknownActiveEditor(id) => write!(f, "Unknown active editor: {}", id),
        }
    }
}

impl std::error::Error for RegistryError {}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// One batch of host UI changes.
#[derive(Default)]
pub struct HostStateChange {
    pub added_documents: Vec<ModelAddedData>,
    pub removed_documents: Vec<String>,
    pub added_editors: Vec<Arc<TextEditorMain>>,
    pub removed_editors: Vec<String>,
    /// `None` leaves the active editor alone, `Some(None)` clears it.
    pub active_editor: Option<Option<String>>,
}

impl HostStateChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(mut self, document: ModelAddedData) -> Self {
        self.added_documents.push(document);
        self
    }

    pub fn remove_document(mut self, uri: impl Into<String>) -> Self {
        self.removed_documents.push(uri.into());
        self
    }

    pub fn add_editor(mut self, editor: Arc<TextEditorMain>) -> Self {
        self.added_editors.push(editor);
        self
    }

    pub fn remove_editor(mut self, id: impl Into<String>) -> Self {
        self.removed_editors.push(id.into());
        self
    }

    pub fn set_active_editor(mut self, id: Option<String>) -> Self {
        self.active_editor = Some(id);
        self
    }
}

#[derive(Default)]
struct HostRegistry {
    documents: HashMap<String, ModelAddedData>,
    editors: Vec<Arc<TextEditorMain>>,
    active_editor: Option<String>,
}

impl HostRegistry {
    fn has_editor(&self, id: &str) -> bool {
        self.editors.iter().any(|e| e.id() == id)
    }

    fn validate(&self, change: &HostStateChange) -> Result<()> {
        let removed_documents: HashSet<&str> = change.removed_documents.iter().map(String::as_str).collect();
        let document_open = |uri: &str| {
            change.added_documents.iter().any(|d| d.uri == uri)
                || (self.documents.contains_key(uri) && !removed_documents.contains(uri))
        };
        for editor in &change.added_editors {
            if !document_open(editor.document_uri()) {
                return Err(RegistryError::UnknownDocument(editor.document_uri().to_string()));
            }
        }
        if let Some(Some(active)) = &change.active_editor {
            let removed = change.removed_editors.iter().any(|id| id == active);
            let evicted = self
                .editors
                .iter()
                .any(|e| e.id() == active.as_str() && removed_documents.contains(e.document_uri()));
            let added = change.added_editors.iter().any(|e| e.id() == active.as_str());
            if !added && (removed || evicted || !self.has_editor(active)) {
                return Err(RegistryError::UnknownActiveEditor(active.clone()));
            }
        }
        Ok(())
    }
}

/// What one change actually did.
#[derive(Default)]
struct Outcome {
    delta: EditorsAndDocumentsDelta,
    added_editors: Vec<Arc<TextEditorMain>>,
    active_changed: Option<Option<String>>,
}

pub struct EditorsAndDocumentsMain {
    proxy: Arc<dyn EditorsAndDocumentsExt>,
    registry: Mutex<HostRegistry>,
    on_document_add: Emitter<Vec<ModelAddedData>>,
    on_document_remove: Emitter<Vec<String>>,
    on_text_editor_add: Emitter<Vec<Arc<TextEditorMain>>>,
    on_text_editor_remove: Emitter<Vec<String>>,
    on_active_editor_changed: Emitter<Option<String>>,
}

impl EditorsAndDocumentsMain {
    pub fn new(proxy: Arc<dyn EditorsAndDocumentsExt>) -> Self {
        Self {
            proxy,
            registry: Mutex::new(HostRegistry::default()),
            on_document_add: Emitter::new(),
            on_document_remove: Emitter::new(),
            on_text_editor_add: Emitter::new(),
            on_text_editor_remove: Emitter::new(),
            on_active_editor_changed: Emitter::new(),
        }
    }

    pub fn apply(&self, change: HostStateChange) -> Result<()> {
        let outcome = {
            let mut registry = self.registry.lock();
            registry.validate(&change)?;
            Self::apply_to_registry(&mut registry, change)
        };

        if outcome.delta.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            added_documents = outcome.delta.added_documents.len(),
            removed_documents = outcome.delta.removed_documents.len(),
            added_editors = outcome.delta.added_editors.len(),
            removed_editors = outcome.delta.removed_editors.len(),
            "sending editors and documents delta"
        );
        self.proxy.accept_editors_and_documents_delta(outcome.delta.clone());

        let Outcome { delta, added_editors, active_changed } = outcome;
        if !delta.added_documents.is_empty() {
            self.on_document_add.fire(&delta.added_documents);
        }
        if !delta.removed_editors.is_empty() {
            self.on_text_editor_remove.fire(&delta.removed_editors);
        }
        if !delta.removed_documents.is_empty() {
            self.on_document_remove.fire(&delta.removed_documents);
        }
        if !added_editors.is_empty() {
            self.on_text_editor_add.fire(&added_editors);
        }
        if let Some(active) = active_changed {
            self.on_active_editor_changed.fire(&active);
        }
        Ok(())
    }

    fn apply_to_registry(registry: &mut HostRegistry, change: HostStateChange) -> Outcome {
        let mut outcome = Outcome::default();
        let previous_active = registry.active_editor.clone();

        for id in change.removed_editors {
            if let Some(index) = registry.editors.iter().position(|e| e.id() == id) {
                registry.editors.remove(index);
                outcome.delta.removed_editors.push(id);
            }
        }

        for uri in change.removed_documents {
            if registry.documents.remove(&uri).is_none() {
                continue;
            }
            let (evicted, kept): (Vec<_>, Vec<_>) =
                registry.editors.drain(..).partition(|e| e.document_uri() == uri);
            registry.editors = kept;
            outcome.delta.removed_editors.extend(evicted.iter().map(|e| e.id().to_string()));
            outcome.delta.removed_documents.push(uri);
        }

        for document in change.added_documents {
            if registry.documents.contains_key(&document.uri) {
                continue;
            }
            registry.documents.insert(document.uri.clone(), document.clone());
            outcome.delta.added_documents.push(document);
        }

        for editor in change.added_editors {
            if registry.has_editor(editor.id()) {
                continue;
            }
            outcome.delta.added_editors.push(editor.add_data());
            registry.editors.push(editor.clone());
            outcome.added_editors.push(editor);
        }

        if let Some(active) = change.active_editor {
            registry.active_editor = active;
        }
        if let Some(active) = registry.active_editor.clone() {
            if !registry.has_editor(&active) {
                registry.active_editor = None;
            }
        }
        if registry.active_editor != previous_active {
            outcome.delta.new_active_editor = Some(registry.active_editor.clone());
            outcome.active_changed = Some(registry.active_editor.clone());
        }
        outcome
    }

    pub fn get_editor(&self, id: &str) -> Option<Arc<TextEditorMain>> {
        self.registry.lock().editors.iter().find(|e| e.id() == id).cloned()
    }

    pub fn all_editors(&self) -> Vec<Arc<TextEditorMain>> {
        self.registry.lock().editors.clone()
    }

    pub fn active_editor(&self) -> Option<String> {
        self.registry.lock().active_editor.clone()
    }

    pub fn has_document(&self, uri: &str) -> bool {
        self.registry.lock().documents.contains_key(uri)
    }

    pub fn get_document(&self, uri: &str) -> Option<ModelAddedData> {
        self.registry.lock().documents.get(uri).cloned()
    }

    /// Keeps the stored snapshot current so a later `add_data` reflects the live document.
    pub(crate) fn update_document(&self, uri: &str, update: impl FnOnce(&mut ModelAddedData)) -> bool {
        match self.registry.lock().documents.get_mut(uri) {
            Some(document) => {
                update(document);
                true
            }
            None => false,
        }
    }

    pub fn on_document_add(&self, listener: impl Fn(&Vec<ModelAddedData>) + Send + Sync + 'static) -> Subscription {
        self.on_document_add.subscribe(listener)
    }

    pub fn on_document_remove(&self, listener: impl Fn(&Vec<String>) + Send + Sync + 'static) -> Subscription {
        self.on_document_remove.subscribe(listener)
    }

    pub fn on_text_editor_add(
        &self,
        listener: impl Fn(&Vec<Arc<TextEditorMain>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_text_editor_add.subscribe(listener)
    }

    pub fn on_text_editor_remove(&self, listener: impl Fn(&Vec<String>) + Send + Sync + 'static) -> Subscription {
        self.on_text_editor_remove.subscribe(listener)
    }

    pub fn on_active_editor_changed(
        &self,
        listener: impl Fn(&Option<String>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_active_editor_changed.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::main::text_editor::EditorControl;
    use crate::main::text_editor::TextEditorProperties;
    use crate::protocol::model::ApplyEditsOptions;
    use crate::protocol::model::SingleEditOperation;
    use crate::protocol::model::TextEditorConfigurationUpdate;
    use crate::protocol::model::TextEditorRevealType;
    use crate::protocol::model::WireRange;
    use crate::protocol::model::WireSelection;

    #[derive(Default)]
    struct RecordingExt {
        deltas: Mutex<Vec<EditorsAndDocumentsDelta>>,
    }

    #[async_trait::async_trait]
    impl EditorsAndDocumentsExt for RecordingExt {
        fn accept_editors_and_documents_delta(&self, delta: EditorsAndDocumentsDelta) {
            self.deltas.lock().push(delta);
        }
    }

    struct NoopControl;

    #[async_trait::async_trait]
    impl EditorControl for NoopControl {
        fn set_configuration(&self, _update: TextEditorConfigurationUpdate) -> anyhow::Result<()> {
            Ok(())
        }

        fn set_selections(&self, _selections: &[WireSelection]) -> anyhow::Result<()> {
            Ok(())
        }

        fn reveal_range(&self, _range: WireRange, _reveal_type: TextEditorRevealType) -> anyhow::Result<()> {
            Ok(())
        }

        async fn apply_edits(
            &self,
            _model_version_id: u64,
            _edits: Vec<SingleEditOperation>,
            _options: ApplyEditsOptions,
        ) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    fn document(uri: &str) -> ModelAddedData {
        ModelAddedData {
            uri: uri.into(),
            version_id: 1,
            lines: vec!["hello".into()],
            eol: "\n".into(),
            mode_id: "plaintext".into(),
            is_dirty: false,
        }
    }

    fn editor(id: &str, uri: &str) -> Arc<TextEditorMain> {
        Arc::new(TextEditorMain::new(id, uri, Arc::new(NoopControl), TextEditorProperties::default(), None))
    }

    fn setup() -> (Arc<RecordingExt>, EditorsAndDocumentsMain) {
        let ext = Arc::new(RecordingExt::default());
        let proxy: Arc<dyn EditorsAndDocumentsExt> = ext.clone();
        (ext, EditorsAndDocumentsMain::new(proxy))
    }

    #[test]
    fn test_change_sends_one_delta() {
        let (ext, main) = setup();
        main.apply(
            HostStateChange::new()
                .add_document(document("file:///a"))
                .add_editor(editor("e1", "file:///a"))
                .set_active_editor(Some("e1".into())),
        )
        .unwrap();

        let deltas = ext.deltas.lock();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].added_documents.len(), 1);
        assert_eq!(deltas[0].added_editors[0].id, "e1");
        assert_eq!(deltas[0].new_active_editor, Some(Some("e1".to_string())));
    }

    #[test]
    fn test_empty_and_repeated_changes_send_nothing() {
        let (ext, main) = setup();
        main.apply(HostStateChange::new()).unwrap();
        main.apply(HostStateChange::new().add_document(document("file:///a"))).unwrap();
        main.apply(HostStateChange::new().add_document(document("file:///a"))).unwrap();
        main.apply(HostStateChange::new().remove_editor("missing")).unwrap();
        assert_eq!(ext.deltas.lock().len(), 1);
    }

    #[test]
    fn test_editor_for_unknown_document_is_rejected() {
        let (ext, main) = setup();
        let err = main.apply(HostStateChange::new().add_editor(editor("e1", "file:///nope"))).unwrap_err();
        assert_eq!(err, RegistryError::UnknownDocument("file:///nope".into()));

        let err = main.apply(HostStateChange::new().set_active_editor(Some("e9".into()))).unwrap_err();
        assert_eq!(err, RegistryError::UnknownActiveEditor("e9".into()));
        assert!(ext.deltas.lock().is_empty());
    }

    #[test]
    fn test_removing_document_evicts_editors_and_clears_active() {
        let (ext, main) = setup();
        main.apply(
            HostStateChange::new()
                .add_document(document("file:///a"))
                .add_editor(editor("e1", "file:///a"))
                .set_active_editor(Some("e1".into())),
        )
        .unwrap();

        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = removed.clone();
        let _sub = main.on_text_editor_remove(move |ids| sink.lock().extend(ids.clone()));

        main.apply(HostStateChange::new().remove_document("file:///a")).unwrap();

        let deltas = ext.deltas.lock();
        let last = deltas.last().unwrap();
        assert_eq!(last.removed_documents, vec!["file:///a"]);
        assert_eq!(last.removed_editors, vec!["e1"]);
        assert_eq!(last.new_active_editor, Some(None));
        assert_eq!(*removed.lock(), vec!["e1".to_string()]);
        assert!(main.get_editor("e1").is_none());
        assert!(main.active_editor().is_none());
    }
}
