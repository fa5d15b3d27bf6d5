//! Core types for ingested documents.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::embedding::EmbeddingMode;

/// Vector record id for chunk `chunk_index` of `document_id`.
pub fn record_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}_chunk_{chunk_index}")
}

/// What the orchestrator remembers about an ingested document.
///
/// `record_ids` lists exactly the vector records created for the document, so
/// deletion never has to scan the store by prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub document_id: String,

    /// Vector record ids in chunk-index order.
    pub record_ids: Vec<String>,

    /// SHA256 hash of the ingested text.
    pub content_hash: String,

    /// UTC timestamp of the last ingest or re-embed.
    pub ingested_at: u64,

    /// Whether the stored vectors came from a trained model.
    pub embedding_mode: EmbeddingMode,

    /// File the text was extracted from, when ingested from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl DocumentState {
    pub fn new(
        document_id: String,
        chunk_count: usize,
        content_hash: String,
        embedding_mode: EmbeddingMode,
    ) -> Self {
        let record_ids = (0..chunk_count)
            .map(|i| record_id(&document_id, i))
            .collect();
        Self {
            document_id,
            record_ids,
            content_hash,
            ingested_at: crate::utils::get_utc_timestamp(),
            embedding_mode,
            source_path: None,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.record_ids.len()
    }
}
