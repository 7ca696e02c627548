//! Host-side `DocumentsMain` and the document hooks of the host UI.
//!
//! Opening and saving go through a `DocumentStore`. Content changes originate in the
//! host editor, which reports them through the `model_*` hooks; the hooks forward only
//! for documents the registry knows, so the plugin side never hears about a document
//! before its `addedDocuments` delta.

use std::sync::Arc;

use plugrpc::CallResult;
use plugrpc::FailureReason;

use crate::main::editors_and_documents::EditorsAndDocumentsMain;
use crate::main::editors_and_documents::HostStateChange;
use crate::protocol::interfaces::DocumentsExt;
use crate::protocol::interfaces::DocumentsMain;
use crate::protocol::model::ModelAddedData;
use crate::protocol::model::ModelChangedEvent;

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads `uri` and returns its initial snapshot.
    async fn open(&self, uri: &str) -> anyhow::Result<ModelAddedData>;

    /// Returns `false` when there was nothing to save.
    async fn save(&self, uri: &str) -> anyhow::Result<bool>;
}

pub struct DocumentsMainImpl {
    store: Arc<dyn DocumentStore>,
    editors_and_documents: Arc<EditorsAndDocumentsMain>,
    proxy: Arc<dyn DocumentsExt>,
}

impl DocumentsMainImpl {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        editors_and_documents: Arc<EditorsAndDocumentsMain>,
        proxy: Arc<dyn DocumentsExt>,
    ) -> Self {
        Self { store, editors_and_documents, proxy }
    }

    pub fn model_changed(&self, uri: &str, event: ModelChangedEvent, is_dirty: bool) -> bool {
        let known = self.editors_and_documents.update_document(uri, |document| {
            document.version_id = event.version_id;
            document.eol = event.eol.clone();
            document.is_dirty = is_dirty;
        });
        if known {
            self.proxy.accept_model_changed(uri.to_string(), event, is_dirty);
        }
        known
    }

    pub fn model_saved(&self, uri: &str) -> bool {
        let mut was_dirty = false;
        let known = self.editors_and_documents.update_document(uri, |document| {
            was_dirty = document.is_dirty;
            document.is_dirty = false;
        });
        if !known {
            return false;
        }
        if was_dirty {
            self.proxy.accept_dirty_state_changed(uri.to_string(), false);
        }
        self.proxy.accept_model_saved(uri.to_string());
        true
    }

    pub fn dirty_state_changed(&self, uri: &str, is_dirty: bool) -> bool {
        let mut changed = false;
        let known = self.editors_and_documents.update_document(uri, |document| {
            changed = document.is_dirty != is_dirty;
            document.is_dirty = is_dirty;
        });
        if changed {
            self.proxy.accept_dirty_state_changed(uri.to_string(), is_dirty);
        }
        known
    }

    pub fn mode_changed(&self, uri: &str, new_mode_id: &str) -> bool {
        let mut old_mode_id = None;
        let known = self.editors_and_documents.update_document(uri, |document| {
            if document.mode_id != new_mode_id {
                old_mode_id = Some(std::mem::replace(&mut document.mode_id, new_mode_id.to_string()));
            }
        });
        if let Some(old_mode_id) = old_mode_id {
            self.proxy.accept_model_mode_changed(uri.to_string(), old_mode_id, new_mode_id.to_string());
        }
        known
    }
}

#[async_trait::async_trait]
impl DocumentsMain for DocumentsMainImpl {
    async fn try_open_document(&self, uri: String) -> CallResult<()> {
        if self.editors_and_documents.has_document(&uri) {
            return Ok(());
        }
        let document = self.store.open(&uri).await.map_err(|e| {
            tracing::warn!(uri = %uri, error = %e, "document open failed");
            FailureReason::failed(format!("Failed to open document {}: {}", uri, e))
        })?;
        // The delta is sent before the reply, so the plugin side finds the document.
        self.editors_and_documents
            .apply(HostStateChange::new().add_document(document))
            .map_err(|e| FailureReason::failed(e.to_string()))
    }

    async fn try_save_document(&self, uri: String) -> CallResult<bool> {
        if !self.editors_and_documents.has_document(&uri) {
            tracing::debug!(uri = %uri, "save requested for unknown document");
            return Ok(false);
        }
        let saved = self.store.save(&uri).await.map_err(|e| {
            tracing::warn!(uri = %uri, error = %e, "document save failed");
            FailureReason::failed(format!("Failed to save document {}: {}", uri, e))
        })?;
        if saved {
            self.model_saved(&uri);
        }
        Ok(saved)
    }
}
