//! Data carried by the RPC interfaces.
//!
//! Every line and column in this module is 1-based, as the host sees them. Conversion to
//! the plugin-facing 0-based types happens in `ext::convert`.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

// ============================================================================
//  COMMANDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_class: Option<String>,
}

impl CommandDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), label: None, icon_class: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

// ============================================================================
//  QUICK OPEN
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PickOptions {
    pub place_holder: Option<String>,
    pub match_on_description: bool,
    pub match_on_detail: bool,
    pub ignore_focus_lost: bool,
    pub context_key: Option<String>,
    pub can_select_many: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickOpenItem {
    pub handle: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub picked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputBoxOptions {
    pub value: Option<String>,
    pub prompt: Option<String>,
    pub place_holder: Option<String>,
    pub password: bool,
    pub ignore_focus_out: bool,
}

// ============================================================================
//  TERMINALS
// ============================================================================

/// Options for `$create_terminal`. `id`, when supplied, must be unique among live terminals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalCreationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell_args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// A `None` value unsets the variable in the shell's environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destroy_term_on_close: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_title: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

// ============================================================================
//  EDITORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePosition {
    pub line_number: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRange {
    pub start_line_number: u32,
    pub start_column: u32,
    pub end_line_number: u32,
    pub end_column: u32,
}

impl WireRange {
    pub fn new(start_line_number: u32, start_column: u32, end_line_number: u32, end_column: u32) -> Self {
        Self { start_line_number, start_column, end_line_number, end_column }
    }
}

/// Anchor is `selectionStart`, the moving end is `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSelection {
    pub selection_start_line_number: u32,
    pub selection_start_column: u32,
    pub position_line_number: u32,
    pub position_column: u32,
}

impl WireSelection {
    pub fn new(
        selection_start_line_number: u32,
        selection_start_column: u32,
        position_line_number: u32,
        position_column: u32,
    ) -> Self {
        Self {
            selection_start_line_number,
            selection_start_column,
            position_line_number,
            position_column,
        }
    }
}

impl Default for WireSelection {
    fn default() -> Self {
        Self::new(1, 1, 1, 1)
    }
}

macro_rules! numeric_enum {
    ($name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $name {
            $($variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(format!("invalid {} {}", stringify!($name), other)),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }
    };
}

numeric_enum!(TextEditorCursorStyle {
    Line = 1,
    Block = 2,
    Underline = 3,
    LineThin = 4,
    BlockOutline = 5,
    UnderlineThin = 6,
});

numeric_enum!(TextEditorLineNumbersStyle {
    Off = 0,
    On = 1,
    Relative = 2,
});

numeric_enum!(TextEditorRevealType {
    Default = 0,
    InCenter = 1,
    InCenterIfOutsideViewport = 2,
    AtTop = 3,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEditorConfiguration {
    pub tab_size: u32,
    pub insert_spaces: bool,
    pub cursor_style: TextEditorCursorStyle,
    pub line_numbers: TextEditorLineNumbersStyle,
}

impl Default for TextEditorConfiguration {
    fn default() -> Self {
        Self {
            tab_size: 4,
            insert_spaces: true,
            cursor_style: TextEditorCursorStyle::Line,
            line_numbers: TextEditorLineNumbersStyle::On,
        }
    }
}

/// Partial update for `$try_set_options`. Absent fields stay as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextEditorConfigurationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_spaces: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_style: Option<TextEditorCursorStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_numbers: Option<TextEditorLineNumbersStyle>,
}

impl TextEditorConfigurationUpdate {
    pub fn apply_to(&self, config: &mut TextEditorConfiguration) {
        if let Some(tab_size) = self.tab_size {
            config.tab_size = tab_size;
        }
        if let Some(insert_spaces) = self.insert_spaces {
            config.insert_spaces = insert_spaces;
        }
        if let Some(cursor_style) = self.cursor_style {
            config.cursor_style = cursor_style;
        }
        if let Some(line_numbers) = self.line_numbers {
            config.line_numbers = line_numbers;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionChangeEvent {
    pub selections: Vec<WireSelection>,
    /// `keyboard`, `mouse` or `api`. Anything else maps to no kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Changed editor properties. Only the fields that changed are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorChangedPropertiesData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<TextEditorConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selections: Option<SelectionChangeEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_ranges: Option<Vec<WireRange>>,
}

impl EditorChangedPropertiesData {
    pub fn is_empty(&self) -> bool {
        self.options.is_none() && self.selections.is_none() && self.visible_ranges.is_none()
    }
}

/// Host editor group position: 0, 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorPosition(pub u32);

impl EditorPosition {
    pub const ONE: Self = Self(0);
    pub const TWO: Self = Self(1);
    pub const THREE: Self = Self(2);
}

pub type TextEditorPositionData = HashMap<String, EditorPosition>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleEditOperation {
    pub range: WireRange,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub force_move_markers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyEditsOptions {
    pub undo_stop_before: bool,
    pub undo_stop_after: bool,
}

impl Default for ApplyEditsOptions {
    fn default() -> Self {
        Self { undo_stop_before: true, undo_stop_after: true }
    }
}

// ============================================================================
//  DOCUMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAddedData {
    pub uri: String,
    pub version_id: u64,
    pub lines: Vec<String>,
    #[serde(rename = "EOL")]
    pub eol: String,
    pub mode_id: String,
    pub is_dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelContentChange {
    pub range: WireRange,
    pub range_length: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelChangedEvent {
    pub changes: Vec<ModelContentChange>,
    pub eol: String,
    pub version_id: u64,
}

// ============================================================================
//  EDITORS AND DOCUMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEditorAddData {
    pub id: String,
    pub document_uri: String,
    pub options: TextEditorConfiguration,
    pub selections: Vec<WireSelection>,
    pub visible_ranges: Vec<WireRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_position: Option<EditorPosition>,
}

/// The only message that changes which documents and editors the plugin side knows about.
///
/// `new_active_editor` has three states: absent (unchanged), `Some(None)` (no active
/// editor) and `Some(Some(id))`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorsAndDocumentsDelta {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_documents: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added_documents: Vec<ModelAddedData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_editors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added_editors: Vec<TextEditorAddData>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub new_active_editor: Option<Option<String>>,
}

impl EditorsAndDocumentsDelta {
    pub fn is_empty(&self) -> bool {
        self.removed_documents.is_empty()
            && self.added_documents.is_empty()
            && self.removed_editors.is_empty()
            && self.added_editors.is_empty()
            && self.new_active_editor.is_none()
    }
}

/// Maps a present field (even `null`) to `Some`, so absence and `null` stay distinct.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ============================================================================
//  WORKSPACE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceFolder {
    pub uri: String,
    pub name: String,
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceFoldersChangeEvent {
    pub added: Vec<WorkspaceFolder>,
    pub removed: Vec<WorkspaceFolder>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_active_editor_three_states() {
        let absent: EditorsAndDocumentsDelta = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.new_active_editor, None);

        let cleared: EditorsAndDocumentsDelta = serde_json::from_value(json!({"newActiveEditor": null})).unwrap();
        assert_eq!(cleared.new_active_editor, Some(None));

        let set: EditorsAndDocumentsDelta = serde_json::from_value(json!({"newActiveEditor": "e1"})).unwrap();
        assert_eq!(set.new_active_editor, Some(Some("e1".to_string())));

        assert_eq!(serde_json::to_value(&cleared).unwrap(), json!({"newActiveEditor": null}));
        assert_eq!(serde_json::to_value(&absent).unwrap(), json!({}));
    }

    #[test]
    fn test_model_added_data_wire_names() {
        let value = json!({
            "uri": "file:///a.ts",
            "versionId": 1,
            "lines": ["a"],
            "EOL": "\n",
            "modeId": "ts",
            "isDirty": false
        });
        let data: ModelAddedData = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(data.eol, "\n");
        assert_eq!(serde_json::to_value(&data).unwrap(), value);
    }

    #[test]
    fn test_numeric_enums() {
        let config = TextEditorConfiguration {
            tab_size: 2,
            insert_spaces: false,
            cursor_style: TextEditorCursorStyle::BlockOutline,
            line_numbers: TextEditorLineNumbersStyle::Relative,
        };
        let value = serde_json::to_value(config).unwrap();
        assert_eq!(value["cursorStyle"], 5);
        assert_eq!(value["lineNumbers"], 2);

        let bad = serde_json::from_value::<TextEditorCursorStyle>(json!(9));
        assert!(bad.is_err());
    }

    #[test]
    fn test_configuration_update_applies_present_fields() {
        let mut config = TextEditorConfiguration::default();
        TextEditorConfigurationUpdate { tab_size: Some(8), ..Default::default() }.apply_to(&mut config);
        assert_eq!(config.tab_size, 8);
        assert!(config.insert_spaces);
    }
}
