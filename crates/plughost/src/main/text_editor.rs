//! Host-side record of one open editor.
//!
//! `TextEditorMain` holds the last published `TextEditorProperties`. The host UI calls
//! `update_properties` whenever the widget changes; only the fields that differ from
//! the previous snapshot are published.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::Emitter;
use crate::event::Subscription;
use crate::protocol::model::ApplyEditsOptions;
use crate::protocol::model::EditorChangedPropertiesData;
use crate::protocol::model::EditorPosition;
use crate::protocol::model::SelectionChangeEvent;
use crate::protocol::model::SingleEditOperation;
use crate::protocol::model::TextEditorAddData;
use crate::protocol::model::TextEditorConfiguration;
use crate::protocol::model::TextEditorConfigurationUpdate;
use crate::protocol::model::TextEditorRevealType;
use crate::protocol::model::WireRange;
use crate::protocol::model::WireSelection;

/// The editor widget behind a `TextEditorMain`.
#[async_trait::async_trait]
pub trait EditorControl: Send + Sync {
    fn set_configuration(&self, update: TextEditorConfigurationUpdate) -> anyhow::Result<()>;

    fn set_selections(&self, selections: &[WireSelection]) -> anyhow::Result<()>;

    fn reveal_range(&self, range: WireRange, reveal_type: TextEditorRevealType) -> anyhow::Result<()>;

    /// Returns `false` when `model_version_id` no longer matches the document.
    async fn apply_edits(
        &self,
        model_version_id: u64,
        edits: Vec<SingleEditOperation>,
        options: ApplyEditsOptions,
    ) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEditorProperties {
    pub selections: Vec<WireSelection>,
    pub options: TextEditorConfiguration,
    pub visible_ranges: Vec<WireRange>,
}

impl Default for TextEditorProperties {
    fn default() -> Self {
        Self {
            selections: vec![WireSelection::default()],
            options: TextEditorConfiguration::default(),
            visible_ranges: Vec::new(),
        }
    }
}

impl TextEditorProperties {
    /// Fields of `self` that differ from `old`. Everything is new when there is no `old`.
    pub fn generate_delta(&self, old: Option<&Self>, source: Option<&str>) -> Option<EditorChangedPropertiesData> {
        let mut delta = EditorChangedPropertiesData::default();
        if old.is_none_or(|old| old.selections != self.selections) {
            delta.selections = Some(SelectionChangeEvent {
                selections: self.selections.clone(),
                source: source.map(str::to_string),
            });
        }
        if old.is_none_or(|old| old.options != self.options) {
            delta.options = Some(self.options);
        }
        if old.is_none_or(|old| old.visible_ranges != self.visible_ranges) {
            delta.visible_ranges = Some(self.visible_ranges.clone());
        }
        (!delta.is_empty()).then_some(delta)
    }
}

pub struct TextEditorMain {
    id: String,
    document_uri: String,
    control: Arc<dyn EditorControl>,
    properties: Mutex<TextEditorProperties>,
    editor_position: Mutex<Option<EditorPosition>>,
    on_properties_changed: Emitter<EditorChangedPropertiesData>,
}

impl TextEditorMain {
    pub fn new(
        id: impl Into<String>,
        document_uri: impl Into<String>,
        control: Arc<dyn EditorControl>,
        properties: TextEditorProperties,
        editor_position: Option<EditorPosition>,
    ) -> Self {
        Self {
            id: id.into(),
            document_uri: document_uri.into(),
            control,
            properties: Mutex::new(properties),
            editor_position: Mutex::new(editor_position),
            on_properties_changed: Emitter::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document_uri(&self) -> &str {
        &self.document_uri
    }

    pub fn control(&self) -> &Arc<dyn EditorControl> {
        &self.control
    }

    pub fn properties(&self) -> TextEditorProperties {
        self.properties.lock().clone()
    }

    pub fn editor_position(&self) -> Option<EditorPosition> {
        *self.editor_position.lock()
    }

    pub fn set_editor_position(&self, position: Option<EditorPosition>) {
        *self.editor_position.lock() = position;
    }

    /// Replaces the snapshot and publishes what changed, tagged with `source`
    /// (`keyboard`, `mouse` or `api`).
    pub fn update_properties(&self, properties: TextEditorProperties, source: Option<&str>) {
        let delta = {
            let mut current = self.properties.lock();
            let delta = properties.generate_delta(Some(&current), source);
            *current = properties;
            delta
        };
        if let Some(delta) = delta {
            self.on_properties_changed.fire(&delta);
        }
    }

    pub fn on_properties_changed(
        &self,
        listener: impl Fn(&EditorChangedPropertiesData) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_properties_changed.subscribe(listener)
    }

    /// The payload announcing this editor in an `addedEditors` delta.
    pub fn add_data(&self) -> TextEditorAddData {
        let properties = self.properties();
        TextEditorAddData {
            id: self.id.clone(),
            document_uri: self.document_uri.clone(),
            options: properties.options,
            selections: properties.selections,
            visible_ranges: properties.visible_ranges,
            editor_position: self.editor_position(),
        }
    }
}
