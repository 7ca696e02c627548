//! Host wire types (1-based) to plugin types (0-based) and back.
//!
//! Ingress subtracts one from every line and column, egress adds one. A zero on the
//! wire is malformed; it clamps to 0 rather than wrapping.

use crate::ext::types::InputBoxOptions;
use crate::ext::types::Position;
use crate::ext::types::QuickPickItem;
use crate::ext::types::QuickPickOptions;
use crate::ext::types::Range;
use crate::ext::types::Selection;
use crate::ext::types::TerminalOptions;
use crate::ext::types::TextEdit;
use crate::ext::types::ViewColumn;
use crate::protocol::model;
use crate::protocol::model::EditorPosition;
use crate::protocol::model::PickOpenItem;
use crate::protocol::model::SingleEditOperation;
use crate::protocol::model::TerminalCreationOptions;
use crate::protocol::model::WirePosition;
use crate::protocol::model::WireRange;
use crate::protocol::model::WireSelection;

fn ingress(value: u32) -> u32 {
    value.saturating_sub(1)
}

fn egress(value: u32) -> u32 {
    value.saturating_add(1)
}

pub fn to_position(position: WirePosition) -> Position {
    Position::new(ingress(position.line_number), ingress(position.column))
}

pub fn from_position(position: Position) -> WirePosition {
    WirePosition { line_number: egress(position.line), column: egress(position.character) }
}

pub fn to_range(range: WireRange) -> Range {
    Range::new(
        ingress(range.start_line_number),
        ingress(range.start_column),
        ingress(range.end_line_number),
        ingress(range.end_column),
    )
}

pub fn from_range(range: Range) -> WireRange {
    WireRange::new(
        egress(range.start.line),
        egress(range.start.character),
        egress(range.end.line),
        egress(range.end.character),
    )
}

pub fn to_selection(selection: WireSelection) -> Selection {
    Selection::new(
        Position::new(ingress(selection.selection_start_line_number), ingress(selection.selection_start_column)),
        Position::new(ingress(selection.position_line_number), ingress(selection.position_column)),
    )
}

pub fn from_selection(selection: Selection) -> WireSelection {
    WireSelection::new(
        egress(selection.anchor.line),
        egress(selection.anchor.character),
        egress(selection.active.line),
        egress(selection.active.character),
    )
}

/// Unknown positions have no plugin-facing column.
pub fn to_view_column(position: EditorPosition) -> Option<ViewColumn> {
    match position {
        EditorPosition::ONE => Some(ViewColumn::One),
        EditorPosition::TWO => Some(ViewColumn::Two),
        EditorPosition::THREE => Some(ViewColumn::Three),
        _ => None,
    }
}

pub fn from_text_edit(edit: &TextEdit) -> SingleEditOperation {
    SingleEditOperation {
        range: from_range(edit.range),
        text: Some(edit.text.clone()),
        force_move_markers: false,
    }
}

pub fn from_terminal_options(options: &TerminalOptions) -> TerminalCreationOptions {
    TerminalCreationOptions {
        title: options.name.clone(),
        shell_path: options.shell_path.clone(),
        shell_args: options.shell_args.clone(),
        cwd: options.cwd.clone(),
        env: options.env.clone(),
        ..TerminalCreationOptions::default()
    }
}

pub fn from_quick_pick_item(handle: u32, item: &QuickPickItem) -> PickOpenItem {
    PickOpenItem {
        handle,
        id: None,
        label: item.label.clone(),
        description: item.description.clone(),
        detail: item.detail.clone(),
        picked: item.picked,
    }
}

pub fn from_quick_pick_options(options: &QuickPickOptions, can_select_many: bool) -> model::PickOptions {
    model::PickOptions {
        place_holder: options.place_holder.clone(),
        match_on_description: options.match_on_description,
        match_on_detail: options.match_on_detail,
        ignore_focus_lost: options.ignore_focus_out,
        context_key: None,
        can_select_many,
    }
}

pub fn from_input_box_options(options: &InputBoxOptions) -> model::InputBoxOptions {
    model::InputBoxOptions {
        value: options.value.clone(),
        prompt: options.prompt.clone(),
        place_holder: options.place_holder.clone(),
        password: options.password,
        ignore_focus_out: options.ignore_focus_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero() {
        let position = to_position(WirePosition { line_number: 1, column: 1 });
        assert_eq!(position, Position::new(0, 0));
        assert_eq!(from_position(position), WirePosition { line_number: 1, column: 1 });
    }

    #[test]
    fn test_round_trip_holds_at_boundaries() {
        for (line, column) in [(1, 1), (1, 2), (2, 1), (10, 80), (u32::MAX, u32::MAX)] {
            let wire = WirePosition { line_number: line, column };
            assert_eq!(from_position(to_position(wire)), wire, "({}, {})", line, column);
        }
    }

    #[test]
    fn test_selection_keeps_direction() {
        // Anchor after the cursor: a reversed selection must stay reversed.
        let wire = WireSelection::new(3, 5, 1, 2);
        let selection = to_selection(wire);
        assert_eq!(selection.anchor, Position::new(2, 4));
        assert_eq!(selection.active, Position::new(0, 1));
        assert!(selection.is_reversed());
        assert_eq!(from_selection(selection), wire);
    }

    #[test]
    fn test_range_conversion() {
        let wire = WireRange::new(1, 1, 4, 9);
        let range = to_range(wire);
        assert_eq!(range, Range::new(0, 0, 3, 8));
        assert_eq!(from_range(range), wire);
    }

    #[test]
    fn test_zero_on_the_wire_clamps() {
        assert_eq!(to_position(WirePosition { line_number: 0, column: 0 }), Position::new(0, 0));
    }

    #[test]
    fn test_view_columns() {
        assert_eq!(to_view_column(EditorPosition(0)), Some(ViewColumn::One));
        assert_eq!(to_view_column(EditorPosition(1)), Some(ViewColumn::Two));
        assert_eq!(to_view_column(EditorPosition(2)), Some(ViewColumn::Three));
        assert_eq!(to_view_column(EditorPosition(3)), None);
    }

    #[test]
    fn test_edit_egress() {
        let edit = TextEdit::insert(Position::new(0, 0), "x");
        let op = from_text_edit(&edit);
        assert_eq!(op.range, WireRange::new(1, 1, 1, 1));
        assert_eq!(op.text.as_deref(), Some("x"));
    }
}
