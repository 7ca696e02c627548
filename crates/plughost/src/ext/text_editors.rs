//! Plugin-side editor events and id-addressed editor operations.

use std::sync::Arc;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::event::DisposableStore;
use crate::event::Emitter;
use crate::event::Subscription;
use crate::ext::convert;
use crate::ext::editors_and_documents::EditorsAndDocumentsExtImpl;
use crate::ext::text_editor::TextEditorExt;
use crate::ext::types::Range;
use crate::ext::types::Selection;
use crate::ext::types::TextEdit;
use crate::ext::types::TextEditorSelectionChangeKind;
use crate::ext::types::ViewColumn;
use crate::protocol::interfaces::TextEditorsExt;
use crate::protocol::model::ApplyEditsOptions;
use crate::protocol::model::EditorChangedPropertiesData;
use crate::protocol::model::TextEditorConfiguration;
use crate::protocol::model::TextEditorConfigurationUpdate;
use crate::protocol::model::TextEditorPositionData;
use crate::protocol::model::TextEditorRevealType;

#[derive(Debug, Clone)]
pub struct TextEditorSelectionChangeEvent {
    pub text_editor: Arc<TextEditorExt>,
    pub selections: Vec<Selection>,
    pub kind: Option<TextEditorSelectionChangeKind>,
}

#[derive(Debug, Clone)]
pub struct TextEditorOptionsChangeEvent {
    pub text_editor: Arc<TextEditorExt>,
    pub options: TextEditorConfiguration,
}

#[derive(Debug, Clone)]
pub struct TextEditorVisibleRangesChangeEvent {
    pub text_editor: Arc<TextEditorExt>,
    pub visible_ranges: Vec<Range>,
}

#[derive(Debug, Clone)]
pub struct TextEditorViewColumnChangeEvent {
    pub text_editor: Arc<TextEditorExt>,
    pub view_column: ViewColumn,
}

pub struct TextEditorsExtImpl {
    editors_and_documents: Arc<EditorsAndDocumentsExtImpl>,
    on_did_change_selection: Emitter<TextEditorSelectionChangeEvent>,
    on_did_change_options: Emitter<TextEditorOptionsChangeEvent>,
    on_did_change_visible_ranges: Emitter<TextEditorVisibleRangesChangeEvent>,
    on_did_change_view_column: Emitter<TextEditorViewColumnChangeEvent>,
    on_did_change_active_text_editor: Arc<Emitter<Option<Arc<TextEditorExt>>>>,
    on_did_change_visible_text_editors: Arc<Emitter<Vec<Arc<TextEditorExt>>>>,
    relays: DisposableStore,
}

impl TextEditorsExtImpl {
    pub fn new(editors_and_documents: Arc<EditorsAndDocumentsExtImpl>) -> Self {
        let active = Arc::new(Emitter::new());
        let visible = Arc::new(Emitter::new());
        let relays = DisposableStore::new();

        let relay = active.clone();
        relays.add(editors_and_documents.on_did_change_active_text_editor(move |e| relay.fire(e)));
        let relay = visible.clone();
        relays.add(editors_and_documents.on_did_change_visible_text_editors(move |e| relay.fire(e)));

        Self {
            editors_and_documents,
            on_did_change_selection: Emitter::new(),
            on_did_change_options: Emitter::new(),
            on_did_change_visible_ranges: Emitter::new(),
            on_did_change_view_column: Emitter::new(),
            on_did_change_active_text_editor: active,
            on_did_change_visible_text_editors: visible,
            relays,
        }
    }

    pub fn get_editor(&self, id: &str) -> Option<Arc<TextEditorExt>> {
        self.editors_and_documents.get_editor(id)
    }

    pub fn active_text_editor(&self) -> Option<Arc<TextEditorExt>> {
        self.editors_and_documents.active_editor()
    }

    pub fn visible_text_editors(&self) -> Vec<Arc<TextEditorExt>> {
        self.editors_and_documents.all_editors()
    }

    pub async fn try_set_selections(&self, id: &str, selections: Vec<Selection>) -> CallResult<()> {
        self.editor_or_disposed(id)?.set_selections(selections).await
    }

    pub async fn try_set_options(&self, id: &str, update: TextEditorConfigurationUpdate) -> CallResult<()> {
        self.editor_or_disposed(id)?.set_options(update).await
    }

    pub async fn try_reveal_range(&self, id: &str, range: Range, reveal_type: TextEditorRevealType) -> CallResult<()> {
        self.editor_or_disposed(id)?.reveal_range(range, reveal_type).await
    }

    pub async fn try_apply_edits(&self, id: &str, edits: Vec<TextEdit>, options: ApplyEditsOptions) -> CallResult<bool> {
        self.editor_or_disposed(id)?.edit(edits, options).await
    }

    pub fn on_did_change_text_editor_selection(
        &self,
        listener: impl Fn(&TextEditorSelectionChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_selection.subscribe(listener)
    }

    pub fn on_did_change_text_editor_options(
        &self,
        listener: impl Fn(&TextEditorOptionsChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_options.subscribe(listener)
    }

    pub fn on_did_change_text_editor_visible_ranges(
        &self,
        listener: impl Fn(&TextEditorVisibleRangesChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_visible_ranges.subscribe(listener)
    }

    pub fn on_did_change_text_editor_view_column(
        &self,
        listener: impl Fn(&TextEditorViewColumnChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_view_column.subscribe(listener)
    }

    pub fn on_did_change_active_text_editor(
        &self,
        listener: impl Fn(&Option<Arc<TextEditorExt>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_active_text_editor.subscribe(listener)
    }

    pub fn on_did_change_visible_text_editors(
        &self,
        listener: impl Fn(&Vec<Arc<TextEditorExt>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_visible_text_editors.subscribe(listener)
    }

    fn editor_or_disposed(&self, id: &str) -> CallResult<Arc<TextEditorExt>> {
        self.get_editor(id)
            .ok_or_else(|| FailureReason::disposed(format!("TextEditor({})", id)))
    }
}

impl Drop for TextEditorsExtImpl {
    fn drop(&mut self) {
        self.relays.dispose();
    }
}

#[async_trait::async_trait]
impl TextEditorsExt for TextEditorsExtImpl {
    fn accept_editor_properties_changed(&self, id: String, props: EditorChangedPropertiesData) {
        let Some(text_editor) = self.get_editor(&id) else {
            tracing::debug!(editor = %id, "dropping properties for unknown editor");
            return;
        };

        let selections: Option<Vec<Selection>> = props
            .selections
            .as_ref()
            .map(|event| event.selections.iter().copied().map(convert::to_selection).collect());
        let visible_ranges: Option<Vec<Range>> = props
            .visible_ranges
            .as_ref()
            .map(|ranges| ranges.iter().copied().map(convert::to_range).collect());

        // Update the whole mirror before any listener can observe it.
        let mut applied: CallResult<()> = Ok(());
        if let Some(options) = props.options {
            applied = applied.and_then(|_| text_editor.accept_options(options));
        }
        if let Some(selections) = &selections {
            applied = applied.and_then(|_| text_editor.accept_selections(selections.clone()));
        }
        if let Some(visible_ranges) = &visible_ranges {
            applied = applied.and_then(|_| text_editor.accept_visible_ranges(visible_ranges.clone()));
        }
        if let Err(e) = applied {
            tracing::debug!(editor = %id, error = %e, "dropping properties for disposed editor");
            return;
        }

        if let Some(options) = props.options {
            self.on_did_change_options.fire(&TextEditorOptionsChangeEvent {
                text_editor: text_editor.clone(),
                options,
            });
        }
        if let Some(selections) = selections {
            let kind = TextEditorSelectionChangeKind::from_source(
                props.selections.as_ref().and_then(|event| event.source.as_deref()),
            );
            self.on_did_change_selection.fire(&TextEditorSelectionChangeEvent {
                text_editor: text_editor.clone(),
                selections,
                kind,
            });
        }
        if let Some(visible_ranges) = visible_ranges {
            self.on_did_change_visible_ranges.fire(&TextEditorVisibleRangesChangeEvent {
                text_editor,
                visible_ranges,
            });
        }
    }

    fn accept_editor_position_data(&self, data: TextEditorPositionData) {
        for (id, position) in data {
            let Some(text_editor) = self.get_editor(&id) else { continue };
            let Some(view_column) = convert::to_view_column(position) else { continue };
            if text_editor.view_column() == Some(view_column) {
                continue;
            }
            if text_editor.accept_view_column(view_column).is_err() {
                continue;
            }
            self.on_did_change_view_column.fire(&TextEditorViewColumnChangeEvent { text_editor, view_column });
        }
    }
}
