//! Host-side `TextEditorsMain`.
//!
//! Forwards plugin requests to the `EditorControl` of the addressed editor and relays
//! each editor's property changes to the plugin side for as long as the editor is open.

use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::event::DisposableStore;
use crate::main::editors_and_documents::EditorsAndDocumentsMain;
use crate::main::text_editor::TextEditorMain;
use crate::protocol::interfaces::TextEditorsExt;
use crate::protocol::interfaces::TextEditorsMain;
use crate::protocol::model::ApplyEditsOptions;
use crate::protocol::model::SingleEditOperation;
use crate::protocol::model::TextEditorConfigurationUpdate;
use crate::protocol::model::TextEditorPositionData;
use crate::protocol::model::TextEditorRevealType;
use crate::protocol::model::WireRange;
use crate::protocol::model::WireSelection;

struct Relays {
    proxy: Arc<dyn TextEditorsExt>,
    per_editor: DashMap<String, DisposableStore>,
}

impl Relays {
    fn editor_added(&self, editor: &Arc<TextEditorMain>) {
        let store = DisposableStore::new();
        let proxy = self.proxy.clone();
        let id = editor.id().to_string();
        store.add(editor.on_properties_changed(move |delta| {
            proxy.accept_editor_properties_changed(id.clone(), delta.clone());
        }));
        if let Some(previous) = self.per_editor.insert(editor.id().to_string(), store) {
            previous.dispose();
        }
    }

    fn editor_removed(&self, id: &str) {
        if let Some((_, store)) = self.per_editor.remove(id) {
            store.dispose();
        }
    }
}

pub struct TextEditorsMainImpl {
    editors_and_documents: Arc<EditorsAndDocumentsMain>,
    relays: Arc<Relays>,
    subscriptions: DisposableStore,
}

impl TextEditorsMainImpl {
    pub fn new(editors_and_documents: Arc<EditorsAndDocumentsMain>, proxy: Arc<dyn TextEditorsExt>) -> Self {
        let relays = Arc::new(Relays { proxy, per_editor: DashMap::new() });
        for editor in editors_and_documents.all_editors() {
            relays.editor_added(&editor);
        }

        let subscriptions = DisposableStore::new();
        let weak: Weak<Relays> = Arc::downgrade(&relays);
        subscriptions.add(editors_and_documents.on_text_editor_add(move |editors| {
            if let Some(relays) = weak.upgrade() {
                editors.iter().for_each(|editor| relays.editor_added(editor));
            }
        }));
        let weak: Weak<Relays> = Arc::downgrade(&relays);
        subscriptions.add(editors_and_documents.on_text_editor_remove(move |ids| {
            if let Some(relays) = weak.upgrade() {
                ids.iter().for_each(|id| relays.editor_removed(id));
            }
        }));

        Self { editors_and_documents, relays, subscriptions }
    }

    /// Publishes the group position of every listed editor.
    pub fn set_position_data(&self, data: TextEditorPositionData) {
        for (id, position) in &data {
            if let Some(editor) = self.editors_and_documents.get_editor(id) {
                editor.set_editor_position(Some(*position));
            }
        }
        self.relays.proxy.accept_editor_position_data(data);
    }

    fn editor(&self, id: &str) -> CallResult<Arc<TextEditorMain>> {
        self.editors_and_documents
            .get_editor(id)
            .ok_or_else(|| FailureReason::disposed(format!("TextEditor({})", id)))
    }
}

impl Drop for TextEditorsMainImpl {
    fn drop(&mut self) {
        self.subscriptions.dispose();
        for entry in self.relays.per_editor.iter() {
            entry.value().dispose();
        }
    }
}

fn control_failure(id: &str, e: anyhow::Error) -> FailureReason {
    tracing::warn!(editor = %id, error = %e, "editor control failed");
    FailureReason::failed(e.to_string())
}

#[async_trait::async_trait]
impl TextEditorsMain for TextEditorsMainImpl {
    async fn try_set_options(&self, id: String, options: TextEditorConfigurationUpdate) -> CallResult<()> {
        let editor = self.editor(&id)?;
        editor.control().set_configuration(options).map_err(|e| control_failure(&id, e))
    }

    async fn try_set_selections(&self, id: String, selections: Vec<WireSelection>) -> CallResult<()> {
        let editor = self.editor(&id)?;
        editor.control().set_selections(&selections).map_err(|e| control_failure(&id, e))
    }

    async fn try_reveal_range(&self, id: String, range: WireRange, reveal_type: TextEditorRevealType) -> CallResult<()> {
        let editor = self.editor(&id)?;
        editor.control().reveal_range(range, reveal_type).map_err(|e| control_failure(&id, e))
    }

    async fn try_apply_edits(
        &self,
        id: String,
        model_version_id: u64,
        edits: Vec<SingleEditOperation>,
        options: ApplyEditsOptions,
    ) -> CallResult<bool> {
        let editor = self.editor(&id)?;
        let control = editor.control().clone();
        control
            .apply_edits(model_version_id, edits, options)
            .await
            .map_err(|e| control_failure(&id, e))
    }
}
