//! # Document Mirrors
//!
//! `DocumentDataExt` is the plugin-side copy of one open document. It is created by an
//! `addedDocuments` delta, updated by `$accept_model_changed` and friends, and disposed
//! when a delta removes it.
//!
//! ## Invariants
//!
//! - `uri` never changes.
//! - Once disposed, every `accept_*` call fails with `Disposed(uri)`. A second
//!   `dispose` is a no-op.
//! - `lines` always holds at least one (possibly empty) line.

use std::sync::Arc;

use parking_lot::RwLock;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::event::Emitter;
use crate::event::Subscription;
use crate::ext::convert;
use crate::ext::editors_and_documents::EditorsAndDocumentsExtImpl;
use crate::ext::types::Position;
use crate::ext::types::Range;
use crate::protocol::interfaces::DocumentsExt;
use crate::protocol::interfaces::DocumentsMain;
use crate::protocol::model::ModelAddedData;
use crate::protocol::model::ModelChangedEvent;

#[derive(Debug)]
struct DocumentState {
    lines: Vec<String>,
    eol: String,
    language_id: String,
    version_id: u64,
    dirty: bool,
    disposed: bool,
}

#[derive(Debug)]
pub struct DocumentDataExt {
    uri: String,
    state: RwLock<DocumentState>,
}

impl DocumentDataExt {
    pub fn new(data: ModelAddedData) -> Self {
        let lines = if data.lines.is_empty() { vec![String::new()] } else { data.lines };
        Self {
            uri: data.uri,
            state: RwLock::new(DocumentState {
                lines,
                eol: data.eol,
                language_id: data.mode_id,
                version_id: data.version_id,
                dirty: data.is_dirty,
                disposed: false,
            }),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version_id(&self) -> u64 {
        self.state.read().version_id
    }

    pub fn language_id(&self) -> String {
        self.state.read().language_id.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    pub fn eol(&self) -> String {
        self.state.read().eol.clone()
    }

    pub fn line_count(&self) -> usize {
        self.state.read().lines.len()
    }

    pub fn line_at(&self, line: usize) -> Option<String> {
        self.state.read().lines.get(line).cloned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.state.read().lines.clone()
    }

    pub fn text(&self) -> String {
        let state = self.state.read();
        state.lines.join(&state.eol)
    }

    /// Text inside `range`, joined with the document's line ending.
    pub fn text_in(&self, range: Range) -> String {
        let state = self.state.read();
        let Some(last) = state.lines.len().checked_sub(1) else {
            return String::new();
        };
        let start_line = (range.start.line as usize).min(last);
        let end_line = (range.end.line as usize).min(last);
        if start_line == end_line {
            let line = &state.lines[start_line];
            return slice_chars(line, range.start.character, range.end.character).to_string();
        }
        let mut parts = Vec::with_capacity(end_line - start_line + 1);
        parts.push(slice_chars(&state.lines[start_line], range.start.character, u32::MAX).to_string());
        for line in &state.lines[start_line + 1..end_line] {
            parts.push(line.clone());
        }
        parts.push(slice_chars(&state.lines[end_line], 0, range.end.character).to_string());
        parts.join(&state.eol)
    }

    /// Clamps `position` into the document.
    pub fn validate_position(&self, position: Position) -> Position {
        let state = self.state.read();
        let last = state.lines.len().saturating_sub(1);
        let line = (position.line as usize).min(last);
        let max_character = state.lines.get(line).map(|l| l.chars().count()).unwrap_or(0) as u32;
        Position::new(line as u32, position.character.min(max_character))
    }

    pub fn is_disposed(&self) -> bool {
        self.state.read().disposed
    }

    pub fn dispose(&self) {
        let mut state = self.state.write();
        if state.disposed {
            return;
        }
        state.dirty = false;
        state.disposed = true;
    }

    pub fn accept_is_dirty(&self, dirty: bool) -> CallResult<()> {
        let mut state = self.writable()?;
        state.dirty = dirty;
        Ok(())
    }

    pub fn accept_language_id(&self, language_id: String) -> CallResult<()> {
        let mut state = self.writable()?;
        state.language_id = language_id;
        Ok(())
    }

    /// Applies content changes in order and adopts the event's version and line ending.
    pub fn accept_model_changed(&self, event: &ModelChangedEvent) -> CallResult<()> {
        let mut state = self.writable()?;
        for change in &event.changes {
            splice(&mut state.lines, convert::to_range(change.range), &change.text);
        }
        state.version_id = event.version_id;
        if !event.eol.is_empty() {
            state.eol = event.eol.clone();
        }
        Ok(())
    }

    fn writable(&self) -> CallResult<parking_lot::RwLockWriteGuard<'_, DocumentState>> {
        let state = self.state.write();
        if state.disposed {
            return Err(FailureReason::disposed(self.uri.clone()));
        }
        Ok(state)
    }
}

fn byte_offset(line: &str, character: u32) -> usize {
    line.char_indices().nth(character as usize).map(|(i, _)| i).unwrap_or(line.len())
}

fn slice_chars(line: &str, from: u32, to: u32) -> &str {
    let start = byte_offset(line, from);
    let end = byte_offset(line, to).max(start);
    &line[start..end]
}

/// Replaces `range` in `lines` with `text`. Out-of-bounds coordinates clamp.
fn splice(lines: &mut Vec<String>, range: Range, text: &str) {
    if lines.is_empty() {
        lines.push(String::new());
    }
    let last = lines.len() - 1;
    let start_line = (range.start.line as usize).min(last);
    let end_line = (range.end.line as usize).min(last).max(start_line);

    let prefix = &lines[start_line][..byte_offset(&lines[start_line], range.start.character)];
    let suffix = &lines[end_line][byte_offset(&lines[end_line], range.end.character)..];
    let joined = format!("{}{}{}", prefix, text, suffix);

    let replacement: Vec<String> = joined
        .split('\n')
        .map(|piece| piece.strip_suffix('\r').unwrap_or(piece).to_string())
        .collect();
    lines.splice(start_line..=end_line, replacement);
}

#[derive(Debug, Clone)]
pub struct TextDocumentContentChange {
    pub range: Range,
    pub range_length: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TextDocumentChangeEvent {
    pub document: Arc<DocumentDataExt>,
    pub content_changes: Vec<TextDocumentContentChange>,
}

#[derive(Debug, Clone)]
pub struct LanguageChangeEvent {
    pub document: Arc<DocumentDataExt>,
    pub old_language_id: String,
}

pub struct DocumentsExtImpl {
    proxy: Arc<dyn DocumentsMain>,
    editors_and_documents: Arc<EditorsAndDocumentsExtImpl>,
    on_did_change_text_document: Emitter<TextDocumentChangeEvent>,
    on_did_save_text_document: Emitter<Arc<DocumentDataExt>>,
    on_did_change_dirty_state: Emitter<Arc<DocumentDataExt>>,
    on_did_change_language: Emitter<LanguageChangeEvent>,
}

impl DocumentsExtImpl {
    pub fn new(proxy: Arc<dyn DocumentsMain>, editors_and_documents: Arc<EditorsAndDocumentsExtImpl>) -> Self {
        Self {
            proxy,
            editors_and_documents,
            on_did_change_text_document: Emitter::new(),
            on_did_save_text_document: Emitter::new(),
            on_did_change_dirty_state: Emitter::new(),
            on_did_change_language: Emitter::new(),
        }
    }

    pub fn get_document(&self, uri: &str) -> Option<Arc<DocumentDataExt>> {
        self.editors_and_documents.get_document(uri)
    }

    pub fn all_documents(&self) -> Vec<Arc<DocumentDataExt>> {
        self.editors_and_documents.all_documents()
    }

    /// Returns the mirror once the host has opened the document and delivered it.
    pub async fn open_text_document(&self, uri: &str) -> CallResult<Arc<DocumentDataExt>> {
        if let Some(document) = self.get_document(uri) {
            return Ok(document);
        }
        self.proxy.try_open_document(uri.to_string()).await?;
        self.get_document(uri)
            .ok_or_else(|| FailureReason::failed(format!("Document {} was not delivered after opening", uri)))
    }

    pub async fn save_document(&self, uri: &str) -> CallResult<bool> {
        if self.get_document(uri).is_none() {
            return Err(FailureReason::disposed(uri.to_string()));
        }
        self.proxy.try_save_document(uri.to_string()).await
    }

    pub fn on_did_change_text_document(
        &self,
        listener: impl Fn(&TextDocumentChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_text_document.subscribe(listener)
    }

    pub fn on_did_save_text_document(
        &self,
        listener: impl Fn(&Arc<DocumentDataExt>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_save_text_document.subscribe(listener)
    }

    pub fn on_did_change_dirty_state(
        &self,
        listener: impl Fn(&Arc<DocumentDataExt>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_dirty_state.subscribe(listener)
    }

    pub fn on_did_change_language(&self, listener: impl Fn(&LanguageChangeEvent) + Send + Sync + 'static) -> Subscription {
        self.on_did_change_language.subscribe(listener)
    }

    fn known(&self, uri: &str, method: &str) -> Option<Arc<DocumentDataExt>> {
        let document = self.get_document(uri);
        if document.is_none() {
            tracing::debug!(uri, method, "dropping update for unknown document");
        }
        document
    }
}

#[async_trait::async_trait]
impl DocumentsExt for DocumentsExtImpl {
    fn accept_model_mode_changed(&self, uri: String, old_mode_id: String, new_mode_id: String) {
        let Some(document) = self.known(&uri, "accept_model_mode_changed") else { return };
        if let Err(e) = document.accept_language_id(new_mode_id) {
            tracing::warn!(uri = %uri, error = %e, "language change on disposed document");
            return;
        }
        self.on_did_change_language.fire(&LanguageChangeEvent { document, old_language_id: old_mode_id });
    }

    fn accept_model_saved(&self, uri: String) {
        let Some(document) = self.known(&uri, "accept_model_saved") else { return };
        if let Err(e) = document.accept_is_dirty(false) {
            tracing::warn!(uri = %uri, error = %e, "save on disposed document");
            return;
        }
        self.on_did_save_text_document.fire(&document);
    }

    fn accept_dirty_state_changed(&self, uri: String, is_dirty: bool) {
        let Some(document) = self.known(&uri, "accept_dirty_state_changed") else { return };
        if let Err(e) = document.accept_is_dirty(is_dirty) {
            tracing::warn!(uri = %uri, error = %e, "dirty state on disposed document");
            return;
        }
        self.on_did_change_dirty_state.fire(&document);
    }

    fn accept_model_changed(&self, uri: String, event: ModelChangedEvent, is_dirty: bool) {
        let Some(document) = self.known(&uri, "accept_model_changed") else { return };
        let applied = document
            .accept_model_changed(&event)
            .and_then(|_| document.accept_is_dirty(is_dirty));
        if let Err(e) = applied {
            tracing::warn!(uri = %uri, error = %e, "content change on disposed document");
            return;
        }
        let content_changes = event
            .changes
            .iter()
            .map(|change| TextDocumentContentChange {
                range: convert::to_range(change.range),
                range_length: change.range_length,
                text: change.text.clone(),
            })
            .collect();
        self.on_did_change_text_document.fire(&TextDocumentChangeEvent { document, content_changes });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::model::ModelContentChange;
    use crate::protocol::model::WireRange;

    fn document(lines: &[&str]) -> DocumentDataExt {
        DocumentDataExt::new(ModelAddedData {
            uri: "file:///a.ts".into(),
            version_id: 1,
            lines: lines.iter().map(|l| l.to_string()).collect(),
            eol: "\n".into(),
            mode_id: "ts".into(),
            is_dirty: false,
        })
    }

    fn change(range: WireRange, text: &str, version_id: u64) -> ModelChangedEvent {
        ModelChangedEvent {
            changes: vec![ModelContentChange { range, range_length: 0, text: text.into() }],
            eol: "\n".into(),
            version_id,
        }
    }

    #[test]
    fn test_insert_within_line() {
        let doc = document(&["hello world"]);
        doc.accept_model_changed(&change(WireRange::new(1, 6, 1, 6), ",", 2)).unwrap();
        assert_eq!(doc.lines(), vec!["hello, world"]);
        assert_eq!(doc.version_id(), 2);
    }

    #[test]
    fn test_multiline_insert_and_join() {
        let doc = document(&["ab", "cd"]);
        doc.accept_model_changed(&change(WireRange::new(1, 2, 1, 2), "x\ny", 2)).unwrap();
        assert_eq!(doc.lines(), vec!["ax", "yb", "cd"]);

        // Delete from the end of line 1 to the start of line 3: joins them.
        doc.accept_model_changed(&change(WireRange::new(1, 3, 3, 1), "", 3)).unwrap();
        assert_eq!(doc.lines(), vec!["axcd"]);
    }

    #[test]
    fn test_crlf_in_inserted_text() {
        let doc = document(&[""]);
        doc.accept_model_changed(&change(WireRange::new(1, 1, 1, 1), "a\r\nb", 2)).unwrap();
        assert_eq!(doc.lines(), vec!["a", "b"]);
    }

    #[test]
    fn test_text_in_range() {
        let doc = document(&["one", "two", "three"]);
        assert_eq!(doc.text_in(Range::new(0, 1, 2, 2)), "ne\ntwo\nth");
        assert_eq!(doc.text_in(Range::new(1, 0, 1, 3)), "two");
        assert_eq!(doc.text(), "one\ntwo\nthree");
    }

    #[test]
    fn test_disposed_document_rejects_mutation() {
        let doc = document(&["a"]);
        doc.accept_is_dirty(true).unwrap();
        doc.dispose();
        doc.dispose();

        assert!(doc.is_disposed());
        assert!(!doc.is_dirty());
        let err = doc.accept_is_dirty(true).unwrap_err();
        match err {
            FailureReason::Disposed(uri) => assert_eq!(uri, "file:///a.ts"),
            _ => panic!("Expected Disposed, got {:?}", err),
        }
        assert!(doc.accept_model_changed(&change(WireRange::new(1, 1, 1, 1), "x", 2)).is_err());
        assert_eq!(doc.lines(), vec!["a"]);
    }

    #[test]
    fn test_validate_position_clamps() {
        let doc = document(&["abc", "de"]);
        assert_eq!(doc.validate_position(Position::new(9, 9)), Position::new(1, 2));
        assert_eq!(doc.validate_position(Position::new(0, 1)), Position::new(0, 1));
    }
}
