//! Registry of ingested documents, persisted as `state.json`.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::StorageResult;
use super::write_atomic;
use crate::documents::DocumentState;

const STATE_VERSION: u32 = 1;

/// Persisted registry file.
#[derive(Serialize, Deserialize)]
struct PersistedState {
    version: u32,
    documents: Vec<DocumentState>,
}

/// Thread-safe map of document id to [`DocumentState`], in ingest order.
///
/// With a backing path every mutation is followed by an atomic rewrite of
/// the state file; without one the registry is memory-only.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    path: Option<PathBuf>,
    documents: RwLock<IndexMap<String, DocumentState>>,
}

impl DocumentRegistry {
    /// Registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the registry at `path`, loading existing state if present.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let documents = if path.exists() {
            let content = std::fs::read(&path)?;
            let state: PersistedState = serde_json::from_slice(&content)?;
            state
                .documents
                .into_iter()
                .map(|doc| (doc.document_id.clone(), doc))
                .collect()
        } else {
            IndexMap::new()
        };

        tracing::debug!(
            target: "storage",
            "opened document registry at {} ({} documents)",
            path.display(),
            documents.len()
        );

        Ok(Self {
            path: Some(path),
            documents: RwLock::new(documents),
        })
    }

    pub fn get(&self, document_id: &str) -> Option<DocumentState> {
        self.documents.read().get(document_id).cloned()
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.documents.read().contains_key(document_id)
    }

    /// All documents in ingest order.
    pub fn list(&self) -> Vec<DocumentState> {
        self.documents.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Insert or replace a document and persist.
    pub fn upsert(&self, state: DocumentState) -> StorageResult<()> {
        let mut documents = self.documents.write();
        documents.insert(state.document_id.clone(), state);
        self.save_locked(&documents)
    }

    /// Remove a document and persist. Returns the removed state, if any.
    pub fn remove(&self, document_id: &str) -> StorageResult<Option<DocumentState>> {
        let mut documents = self.documents.write();
        let removed = documents.shift_remove(document_id);
        if removed.is_some() {
            self.save_locked(&documents)?;
        }
        Ok(removed)
    }

    // Caller holds the write lock so concurrent mutations serialise their writes
    fn save_locked(&self, documents: &IndexMap<String, DocumentState>) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let state = PersistedState {
            version: STATE_VERSION,
            documents: documents.values().cloned().collect(),
        };
        let content = serde_json::to_vec_pretty(&state)?;
        write_atomic(path, &content)?;
        Ok(())
    }
}
