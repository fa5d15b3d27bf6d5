//! Retrieval orchestrator: chunk → embed → index → query.
//!
//! [`Retriever`] owns the collaborators and exposes the serving surface:
//! `ingest`, `search`, `delete` and `train`. Every record it writes is
//! remembered in the [`DocumentRegistry`], so deletion removes exactly the
//! records a document created and never matches other documents by prefix.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Settings, StoreBackend, TrainingConfig};
use crate::documents::{
    Chunker, ChunkingConfig, DocumentState, SlidingWindowChunker, extract_text, record_id,
};
use crate::embedding::{EmbedError, Embedder, EmbeddingMode, SkipGramEmbedder};
use crate::error::{RetrievalError, RetrievalResult};
use crate::storage::{ChunkStorage, DocumentRegistry, FileChunkStorage, StorageError};
use crate::training::{ModelArtifacts, TrainingParams, train};
use crate::utils::calculate_hash;
use crate::vector::{
    HashVectorStore, InProcessHashBackend, MemoryVectorStore, Metadata, QueryResult, VectorStore,
};

/// Sub-directory of the data dir holding chunk files.
pub const CHUNKS_DIR: &str = "docs";
/// Document registry file in the data dir.
pub const REGISTRY_FILE: &str = "state.json";
/// Memory store snapshot file in the data dir.
pub const VECTOR_SNAPSHOT_FILE: &str = "vectors.json";

/// Outcome of [`Retriever::train`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub vocabulary_size: usize,
    pub epochs: usize,
    /// Directory of the published generation.
    pub artifact_location: PathBuf,
    pub generation: String,
    pub pairs: usize,
    pub final_loss: Option<f32>,
}

/// Snapshot of what the retriever holds, for `status` output.
#[derive(Debug, Clone, Serialize)]
pub struct RetrieverStatus {
    pub documents: usize,
    pub records: usize,
    pub dimension: usize,
    pub embedding_mode: EmbeddingMode,
}

struct TrainingSetup {
    artifacts: ModelArtifacts,
    config: TrainingConfig,
}

/// The retrieval pipeline over pluggable embedder, store and chunk storage.
pub struct Retriever {
    chunking: ChunkingConfig,
    chunker: Box<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunks: Arc<dyn ChunkStorage>,
    registry: DocumentRegistry,
    training: Option<TrainingSetup>,
    /// Serialises writers of the same document: indexing, reembed and delete.
    document_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Retriever {
    /// Assemble a retriever. The embedder and store must agree on dimension.
    pub fn new(
        chunking: ChunkingConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunks: Arc<dyn ChunkStorage>,
        registry: DocumentRegistry,
    ) -> RetrievalResult<Self> {
        chunking.validate().map_err(RetrievalError::Validation)?;
        if embedder.dimension() != store.dimension() {
            return Err(RetrievalError::Validation(format!(
                "embedder dimension {} does not match vector store dimension {}",
                embedder.dimension(),
                store.dimension()
            )));
        }
        Ok(Self {
            chunking,
            chunker: Box::new(SlidingWindowChunker::new()),
            embedder,
            store,
            chunks,
            registry,
            training: None,
            document_locks: DashMap::new(),
        })
    }

    /// Enable [`Retriever::train`], publishing generations under `artifacts`.
    pub fn with_training(mut self, artifacts: ModelArtifacts, config: TrainingConfig) -> Self {
        self.training = Some(TrainingSetup { artifacts, config });
        self
    }

    /// Build the on-disk pipeline described by `settings`.
    pub fn from_settings(settings: &Settings) -> RetrievalResult<Self> {
        settings.validate().map_err(RetrievalError::Validation)?;

        let data_dir = settings.data_dir();
        let dimension = settings.embedding.dimension;

        let chunks = FileChunkStorage::new(data_dir.join(CHUNKS_DIR))?;
        // Hash records live only as long as the process, so the registry must too
        let registry = match settings.store.backend {
            StoreBackend::Hash => {
                tracing::warn!(
                    target: "retrieval",
                    "hash store backend keeps records in process memory; \
                     documents will not survive a restart"
                );
                DocumentRegistry::in_memory()
            }
            StoreBackend::Memory => DocumentRegistry::open(data_dir.join(REGISTRY_FILE))?,
        };
        let store: Arc<dyn VectorStore> = match settings.store.backend {
            StoreBackend::Memory if settings.store.snapshot => Arc::new(
                MemoryVectorStore::with_snapshot(dimension, data_dir.join(VECTOR_SNAPSHOT_FILE))?,
            ),
            StoreBackend::Memory => Arc::new(MemoryVectorStore::new(dimension)),
            StoreBackend::Hash => Arc::new(HashVectorStore::with_prefix(
                InProcessHashBackend::new(),
                dimension,
                settings.store.key_prefix.clone(),
            )),
        };
        let model_dir = settings.model_dir();
        let embedder = Arc::new(SkipGramEmbedder::open(&model_dir, dimension));

        tracing::debug!(
            target: "retrieval",
            "retriever ready: data_dir={} model_dir={} store={:?}",
            data_dir.display(),
            model_dir.display(),
            settings.store.backend
        );

        Ok(Self::new(
            settings.chunking.clone(),
            embedder,
            store,
            Arc::new(chunks),
            registry,
        )?
        .with_training(ModelArtifacts::new(model_dir), settings.training.clone()))
    }

    fn document_lock(&self, document_id: &str) -> Arc<Mutex<()>> {
        self.document_locks
            .entry(document_id.to_string())
            .or_default()
            .clone()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Chunk, embed and index `text`. Returns the new document id.
    pub fn ingest(&self, text: &str) -> RetrievalResult<String> {
        self.ingest_with_metadata(text, Metadata::new())
    }

    /// [`Retriever::ingest`] with extra metadata copied onto every record.
    ///
    /// The pipeline's own keys (`document_id`, `chunk_index`, `content`,
    /// `embedding_mode`) take precedence over caller keys of the same name.
    pub fn ingest_with_metadata(&self, text: &str, metadata: Metadata) -> RetrievalResult<String> {
        self.ingest_inner(text, metadata, None)
    }

    /// Extract text from a `.txt`, `.md`, `.pdf` or `.docx` file and ingest it.
    ///
    /// Records carry the file path as `source_path`.
    pub fn ingest_file(&self, path: impl AsRef<Path>) -> RetrievalResult<String> {
        self.ingest_file_with_metadata(path, Metadata::new())
    }

    pub fn ingest_file_with_metadata(
        &self,
        path: impl AsRef<Path>,
        mut metadata: Metadata,
    ) -> RetrievalResult<String> {
        let path = path.as_ref();
        let text = extract_text(path)?;
        metadata.insert(
            "source_path".to_string(),
            json!(path.to_string_lossy()),
        );
        self.ingest_inner(&text, metadata, Some(path.to_path_buf()))
    }

    fn ingest_inner(
        &self,
        text: &str,
        metadata: Metadata,
        source_path: Option<PathBuf>,
    ) -> RetrievalResult<String> {
        let chunks: Vec<String> = self
            .chunker
            .chunk(text, &self.chunking)
            .into_iter()
            .map(|chunk| chunk.content)
            .collect();
        if chunks.is_empty() {
            return Err(RetrievalError::Validation(
                "document is empty after normalisation; nothing to ingest".to_string(),
            ));
        }

        let document_id = self.chunks.save(&chunks)?;
        let lock = self.document_lock(&document_id);
        {
            let guard = lock.lock();
            let result = self.index_document(&document_id, &chunks, text, metadata, source_path);
            if let Err(e) = result {
                tracing::warn!(
                    target: "retrieval",
                    "ingest of {document_id} failed, rolling back: {e}"
                );
                self.rollback(&document_id, chunks.len());
                drop(guard);
                self.document_locks.remove(&document_id);
                return Err(e);
            }
        }

        tracing::info!(
            target: "retrieval",
            "ingested {document_id}: {} chunks",
            chunks.len()
        );
        Ok(document_id)
    }

    fn index_document(
        &self,
        document_id: &str,
        chunks: &[String],
        text: &str,
        metadata: Metadata,
        source_path: Option<PathBuf>,
    ) -> RetrievalResult<()> {
        let mode = self.write_records(document_id, chunks, &metadata)?;
        self.store.persist()?;

        let mut state =
            DocumentState::new(document_id.to_string(), chunks.len(), calculate_hash(text), mode);
        state.source_path = source_path;
        self.registry.upsert(state)?;
        Ok(())
    }

    /// Encode `chunks` and upsert one record per chunk in index order.
    fn write_records(
        &self,
        document_id: &str,
        chunks: &[String],
        extra: &Metadata,
    ) -> RetrievalResult<EmbeddingMode> {
        let mode = self.embedder.mode();
        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let vectors = self.embedder.encode(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(RetrievalError::Validation(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        for (index, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
            let mut metadata = extra.clone();
            metadata.insert("document_id".to_string(), json!(document_id));
            metadata.insert("chunk_index".to_string(), json!(index));
            metadata.insert("content".to_string(), json!(chunk));
            metadata.insert("embedding_mode".to_string(), json!(mode.label()));
            self.store
                .insert(&record_id(document_id, index), vector, metadata)?;
        }
        Ok(mode)
    }

    /// Best-effort removal of everything a failed ingest may have written.
    fn rollback(&self, document_id: &str, chunk_count: usize) {
        for index in 0..chunk_count {
            if let Err(e) = self.store.delete(&record_id(document_id, index)) {
                tracing::warn!(target: "retrieval", "rollback: {e}");
            }
        }
        if let Err(e) = self.store.persist() {
            tracing::warn!(target: "retrieval", "rollback: {e}");
        }
        if let Err(e) = self.chunks.delete(document_id) {
            tracing::warn!(target: "retrieval", "rollback: {e}");
        }
        if let Err(e) = self.registry.remove(document_id) {
            tracing::warn!(target: "retrieval", "rollback: {e}");
        }
    }

    /// The `top_k` chunks most similar to `query`, best first.
    pub fn search(&self, query: &str, top_k: usize) -> RetrievalResult<Vec<QueryResult>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::Validation("query is empty".to_string()));
        }
        let vector = self
            .embedder
            .encode(&[query])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RetrievalError::Validation("embedder returned no vector for query".to_string())
            })?;

        let results = self.store.query(&vector, top_k)?;
        tracing::debug!(
            target: "retrieval",
            "search returned {} results (top_k {top_k})",
            results.len()
        );
        Ok(results)
    }

    /// Remove a document's records and chunks. Returns `false` for unknown ids.
    pub fn delete(&self, document_id: &str) -> RetrievalResult<bool> {
        if self.registry.get(document_id).is_none() {
            tracing::debug!(target: "retrieval", "delete of unknown document {document_id}");
            return Ok(false);
        }
        let lock = self.document_lock(document_id);
        let guard = lock.lock();
        // Lost to a concurrent delete
        let Some(state) = self.registry.get(document_id) else {
            drop(guard);
            self.document_locks.remove(document_id);
            return Ok(false);
        };

        for id in &state.record_ids {
            self.store.delete(id)?;
        }
        self.store.persist()?;
        self.chunks.delete(document_id)?;
        self.registry.remove(document_id)?;
        // Later callers re-check the registry, so a fresh lock is equivalent
        drop(guard);
        self.document_locks.remove(document_id);

        tracing::info!(
            target: "retrieval",
            "deleted {document_id} ({} records)",
            state.record_ids.len()
        );
        Ok(true)
    }

    /// Train on the stored chunks of `document_ids`, publish, and reload.
    ///
    /// `epochs` overrides the configured count. Unknown ids contribute no
    /// chunks; a corpus with no usable text is rejected.
    pub fn train(
        &self,
        document_ids: &[String],
        epochs: Option<usize>,
    ) -> RetrievalResult<TrainingSummary> {
        let setup = self.training.as_ref().ok_or_else(|| {
            EmbedError::Unsupported("no model directory configured for training".to_string())
        })?;

        let mut corpus = Vec::new();
        for document_id in document_ids {
            let chunks = self.chunks.load(document_id)?;
            if chunks.is_empty() {
                tracing::warn!(target: "retrieval", "no stored chunks for {document_id}");
            }
            corpus.extend(chunks);
        }

        let mut params = TrainingParams::new(self.embedder.dimension(), &setup.config);
        if let Some(epochs) = epochs {
            params = params.with_epochs(epochs);
        }
        let model = train(&corpus, &params)?;
        let manifest = setup
            .artifacts
            .publish(&model, setup.config.keep_generations)?;

        if !self.embedder.reload()? {
            tracing::warn!(
                target: "retrieval",
                "embedder did not switch to generation {}",
                manifest.generation
            );
        }

        Ok(TrainingSummary {
            vocabulary_size: manifest.vocab_size,
            epochs: manifest.epochs,
            artifact_location: setup.artifacts.generation_dir(&manifest.generation),
            generation: manifest.generation,
            pairs: model.report.pairs,
            final_loss: manifest.final_loss,
        })
    }

    /// Re-encode a document's stored chunks with the current model.
    ///
    /// Returns `false` for unknown ids.
    pub fn reembed(&self, document_id: &str) -> RetrievalResult<bool> {
        if self.registry.get(document_id).is_none() {
            return Ok(false);
        }
        let lock = self.document_lock(document_id);
        let guard = lock.lock();
        // A concurrent delete may have won the lock
        let Some(mut state) = self.registry.get(document_id) else {
            drop(guard);
            self.document_locks.remove(document_id);
            return Ok(false);
        };
        let chunks = self.chunks.load(document_id)?;
        if chunks.len() != state.chunk_count() {
            return Err(StorageError::Corrupt {
                document_id: document_id.to_string(),
                reason: format!(
                    "{} stored chunks but {} recorded vectors",
                    chunks.len(),
                    state.chunk_count()
                ),
            }
            .into());
        }

        // Keep caller metadata, replace what the pipeline owns
        let mut extra = Metadata::new();
        if let Some(record) = state
            .record_ids
            .first()
            .map(|id| self.store.get(id))
            .transpose()?
            .flatten()
        {
            extra = record.metadata;
        }

        state.embedding_mode = self.write_records(document_id, &chunks, &extra)?;
        state.ingested_at = crate::utils::get_utc_timestamp();
        self.store.persist()?;
        self.registry.upsert(state)?;
        Ok(true)
    }

    /// [`Retriever::reembed`] every registered document. Returns the count.
    pub fn reembed_all(&self) -> RetrievalResult<usize> {
        let mut count = 0;
        for state in self.registry.list() {
            if self.reembed(&state.document_id)? {
                count += 1;
            }
        }
        tracing::info!(target: "retrieval", "re-embedded {count} documents");
        Ok(count)
    }

    /// Registered documents in ingest order.
    pub fn documents(&self) -> Vec<DocumentState> {
        self.registry.list()
    }

    pub fn document(&self, document_id: &str) -> Option<DocumentState> {
        self.registry.get(document_id)
    }

    pub fn status(&self) -> RetrievalResult<RetrieverStatus> {
        Ok(RetrieverStatus {
            documents: self.registry.len(),
            records: self.store.len()?,
            dimension: self.embedder.dimension(),
            embedding_mode: self.embedder.mode(),
        })
    }
}
