//! Plugin-facing value types. Lines and characters are 0-based.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A range with `start <= end`. Constructors swap reversed endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Self {
        Self::from_positions(Position::new(start_line, start_character), Position::new(end_line, end_character))
    }

    pub fn from_positions(a: Position, b: Position) -> Self {
        if a <= b { Self { start: a, end: b } } else { Self { start: b, end: a } }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

/// `anchor` stays put while `active` moves with the cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub fn new(anchor: Position, active: Position) -> Self {
        Self { anchor, active }
    }

    pub fn range(&self) -> Range {
        Range::from_positions(self.anchor, self.active)
    }

    pub fn is_reversed(&self) -> bool {
        self.active < self.anchor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewColumn {
    Active,
    One,
    Two,
    Three,
}

impl ViewColumn {
    pub fn value(self) -> i32 {
        match self {
            Self::Active => -1,
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEditorSelectionChangeKind {
    Keyboard,
    Mouse,
    Command,
}

impl TextEditorSelectionChangeKind {
    pub fn from_source(source: Option<&str>) -> Option<Self> {
        match source? {
            "keyboard" => Some(Self::Keyboard),
            "mouse" => Some(Self::Mouse),
            "api" => Some(Self::Command),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalOptions {
    pub name: Option<String>,
    pub shell_path: Option<String>,
    pub shell_args: Option<Vec<String>>,
    pub cwd: Option<String>,
    pub env: Option<HashMap<String, Option<String>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickPickItem {
    pub label: String,
    pub description: Option<String>,
    pub detail: Option<String>,
    pub picked: bool,
}

impl QuickPickItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickPickOptions {
    pub place_holder: Option<String>,
    pub match_on_description: bool,
    pub match_on_detail: bool,
    pub ignore_focus_out: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBoxOptions {
    pub value: Option<String>,
    pub prompt: Option<String>,
    pub place_holder: Option<String>,
    pub password: bool,
    pub ignore_focus_out: bool,
}

/// A replacement of `range` by `text`, in document coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range,
    pub text: String,
}

impl TextEdit {
    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        Self { range, text: text.into() }
    }

    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self { range: Range::from_positions(position, position), text: text.into() }
    }

    pub fn delete(range: Range) -> Self {
        Self { range, text: String::new() }
    }
}
