//! Plugin-side mirror of one host editor.
//!
//! The mirror only changes through `accept_*`, which the delta handlers call. Plugin
//! writes go to the host over RPC and come back as deltas.

use std::sync::Arc;

use parking_lot::Mutex;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::ext::convert;
use crate::ext::documents::DocumentDataExt;
use crate::ext::types::Range;
use crate::ext::types::Selection;
use crate::ext::types::TextEdit;
use crate::ext::types::ViewColumn;
use crate::protocol::interfaces::TextEditorsMain;
use crate::protocol::model::ApplyEditsOptions;
use crate::protocol::model::TextEditorConfiguration;
use crate::protocol::model::TextEditorConfigurationUpdate;
use crate::protocol::model::TextEditorRevealType;

#[derive(Debug, Clone, PartialEq)]
struct EditorState {
    selections: Vec<Selection>,
    options: TextEditorConfiguration,
    visible_ranges: Vec<Range>,
    view_column: Option<ViewColumn>,
    disposed: bool,
}

pub struct TextEditorExt {
    id: String,
    proxy: Arc<dyn TextEditorsMain>,
    document: Arc<DocumentDataExt>,
    state: Mutex<EditorState>,
}

impl TextEditorExt {
    pub fn new(
        id: String,
        proxy: Arc<dyn TextEditorsMain>,
        document: Arc<DocumentDataExt>,
        selections: Vec<Selection>,
        options: TextEditorConfiguration,
        visible_ranges: Vec<Range>,
        view_column: Option<ViewColumn>,
    ) -> Self {
        Self {
            id,
            proxy,
            document,
            state: Mutex::new(EditorState { selections, options, visible_ranges, view_column, disposed: false }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> &Arc<DocumentDataExt> {
        &self.document
    }

    /// The primary selection.
    pub fn selection(&self) -> Selection {
        self.state.lock().selections.first().copied().unwrap_or_default()
    }

    pub fn selections(&self) -> Vec<Selection> {
        self.state.lock().selections.clone()
    }

    pub fn options(&self) -> TextEditorConfiguration {
        self.state.lock().options
    }

    pub fn visible_ranges(&self) -> Vec<Range> {
        self.state.lock().visible_ranges.clone()
    }

    pub fn view_column(&self) -> Option<ViewColumn> {
        self.state.lock().view_column
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn dispose(&self) {
        self.state.lock().disposed = true;
    }

    pub(crate) fn accept_options(&self, options: TextEditorConfiguration) -> CallResult<()> {
        self.update(|state| state.options = options)
    }

    pub(crate) fn accept_selections(&self, selections: Vec<Selection>) -> CallResult<()> {
        self.update(|state| state.selections = selections)
    }

    pub(crate) fn accept_visible_ranges(&self, visible_ranges: Vec<Range>) -> CallResult<()> {
        self.update(|state| state.visible_ranges = visible_ranges)
    }

    pub(crate) fn accept_view_column(&self, view_column: ViewColumn) -> CallResult<()> {
        self.update(|state| state.view_column = Some(view_column))
    }

    pub async fn set_selections(&self, selections: Vec<Selection>) -> CallResult<()> {
        self.ensure_live()?;
        let wire = selections.into_iter().map(convert::from_selection).collect();
        self.proxy.try_set_selections(self.id.clone(), wire).await
    }

    pub async fn set_options(&self, update: TextEditorConfigurationUpdate) -> CallResult<()> {
        self.ensure_live()?;
        self.proxy.try_set_options(self.id.clone(), update).await
    }

    pub async fn reveal_range(&self, range: Range, reveal_type: TextEditorRevealType) -> CallResult<()> {
        self.ensure_live()?;
        self.proxy.try_reveal_range(self.id.clone(), convert::from_range(range), reveal_type).await
    }

    /// Applies `edits` against the document version this mirror currently holds.
    ///
    /// Returns `false` when the host rejected the edit, for example because the
    /// document moved on in the meantime.
    pub async fn edit(&self, edits: Vec<TextEdit>, options: ApplyEditsOptions) -> CallResult<bool> {
        self.ensure_live()?;
        let version_id = self.document.version_id();
        let wire = edits.iter().map(convert::from_text_edit).collect();
        self.proxy.try_apply_edits(self.id.clone(), version_id, wire, options).await
    }

    fn ensure_live(&self) -> CallResult<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut EditorState)) -> CallResult<()> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(self.disposed_error());
        }
        apply(&mut state);
        Ok(())
    }

    fn disposed_error(&self) -> FailureReason {
        FailureReason::disposed(format!("TextEditor({})", self.id))
    }
}

impl std::fmt::Debug for TextEditorExt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEditorExt")
            .field("id", &self.id)
            .field("document", &self.document.uri())
            .field("state", &*self.state.lock())
            .finish()
    }
}
