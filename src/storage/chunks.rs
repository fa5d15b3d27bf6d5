//! Chunk storage: `save(chunks) -> id`, `load(id)`, `delete(id)`.

use std::path::{Path, PathBuf};

use super::error::{StorageError, StorageResult};
use super::write_atomic;

/// Key-value store of chunk lists, keyed by generated document id.
pub trait ChunkStorage: Send + Sync {
    /// Persist `chunks` under a freshly generated document id.
    fn save(&self, chunks: &[String]) -> StorageResult<String>;

    /// Chunks of `document_id` in order; empty when the id is unknown or
    /// could never have been generated.
    fn load(&self, document_id: &str) -> StorageResult<Vec<String>>;

    /// Remove a document's chunks. Unknown ids are a no-op.
    fn delete(&self, document_id: &str) -> StorageResult<()>;
}

/// One JSON array per document under a base directory: `<id>.chunks.json`.
#[derive(Debug, Clone)]
pub struct FileChunkStorage {
    base_path: PathBuf,
}

impl FileChunkStorage {
    /// Open (creating if needed) chunk storage rooted at `base_path`.
    pub fn new(base_path: impl AsRef<Path>) -> StorageResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// File for `document_id`, or `None` if the id is not of the generated
    /// form and so could escape `base_path`.
    fn chunk_path(&self, document_id: &str) -> Option<PathBuf> {
        let valid = !document_id.is_empty()
            && document_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        valid.then(|| self.base_path.join(format!("{document_id}.chunks.json")))
    }
}

impl ChunkStorage for FileChunkStorage {
    fn save(&self, chunks: &[String]) -> StorageResult<String> {
        let document_id = uuid::Uuid::new_v4().to_string();
        let path = self
            .chunk_path(&document_id)
            .ok_or_else(|| StorageError::InvalidDocumentId(document_id.clone()))?;

        let content = serde_json::to_vec(chunks)?;
        write_atomic(&path, &content)?;

        tracing::debug!(
            target: "storage",
            "saved {} chunks for document {document_id}",
            chunks.len()
        );
        Ok(document_id)
    }

    fn load(&self, document_id: &str) -> StorageResult<Vec<String>> {
        let Some(path) = self.chunk_path(document_id) else {
            return Ok(Vec::new());
        };
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&content).map_err(|e| StorageError::Corrupt {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })
    }

    fn delete(&self, document_id: &str) -> StorageResult<()> {
        let Some(path) = self.chunk_path(document_id) else {
            return Ok(());
        };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
