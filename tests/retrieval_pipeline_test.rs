//! End-to-end retrieval pipeline tests.
//!
//! Exercises the on-disk pipeline built from `Settings`: chunk storage,
//! document registry, memory store snapshot and published model artifacts.

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tempfile::TempDir;

use ragline::config::{OptimizerKind, Settings, StoreBackend};
use ragline::documents::{ChunkingConfig, record_id, split_into_chunks};
use ragline::retrieval::REGISTRY_FILE;
use ragline::storage::{ChunkStorage, DocumentRegistry, FileChunkStorage, StorageResult};
use ragline::vector::MemoryVectorStore;
use ragline::{EmbeddingMode, PlaceholderEmbedder, RetrievalError, Retriever, VectorStore};

const DOCUMENTS: [&str; 3] = [
    "The borrow checker enforces ownership rules at compile time. \
     Every value has a single owner and references must not outlive it.",
    "Garbage collected runtimes trace reachable objects and reclaim the rest. \
     Pauses depend on heap size and allocation rate.",
    "Vector databases index embeddings for nearest neighbour search. \
     Cosine similarity compares the angle between two vectors.",
];

fn settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.data_dir = dir.path().join("data");
    settings.embedding.model_dir = dir.path().join("models");
    settings.embedding.dimension = 16;
    settings.chunking = ChunkingConfig::new(60, 10);
    settings.training.epochs = 5;
    settings.training.learning_rate = 0.01;
    settings.training.optimizer = OptimizerKind::Adam;
    settings.training.seed = Some(42);
    settings
}

#[test]
fn test_degraded_search_before_training() -> Result<()> {
    let dir = TempDir::new()?;
    let retriever = Retriever::from_settings(&settings(&dir))?;

    let doc = retriever.ingest(DOCUMENTS[0])?;
    assert_eq!(retriever.embedder().mode(), EmbeddingMode::Degraded);
    assert_eq!(
        retriever.document(&doc).unwrap().embedding_mode,
        EmbeddingMode::Degraded
    );

    let results = retriever.search("ownership", 3)?;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.score == 0.0));
    assert!(results.iter().all(|r| r.metadata["embedding_mode"] == "degraded"));
    Ok(())
}

#[test]
fn test_chunk_query_ranks_its_own_record_first_after_training() -> Result<()> {
    let dir = TempDir::new()?;
    let retriever = Retriever::from_settings(&settings(&dir))?;

    // Given: three documents and a model trained on them
    let ids: Vec<String> = DOCUMENTS
        .iter()
        .map(|text| retriever.ingest(text))
        .collect::<Result<_, _>>()?;
    let summary = retriever.train(&ids, None)?;
    assert!(summary.vocabulary_size > 20);
    assert_eq!(summary.epochs, 5);
    assert!(summary.artifact_location.join("weights.bin").is_file());
    assert!(matches!(
        retriever.embedder().mode(),
        EmbeddingMode::Trained { ref generation } if *generation == summary.generation
    ));

    // When: the stored vectors are refreshed with the trained model
    assert_eq!(retriever.reembed_all()?, 3);

    // Then: every chunk used as a query finds itself first
    for (doc, text) in ids.iter().zip(DOCUMENTS) {
        let chunks = split_into_chunks(text, 60, 10)?;
        for (index, chunk) in chunks.iter().enumerate() {
            let results = retriever.search(chunk, 3)?;
            assert_eq!(results[0].id, record_id(doc, index), "query: {chunk}");
            assert!((results[0].score - 1.0).abs() < 1e-4);
            assert_eq!(results[0].metadata["content"], chunk.as_str());
            assert_eq!(results[0].metadata["embedding_mode"], "trained");
        }
    }
    Ok(())
}

#[test]
fn test_state_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let doc = {
        let retriever = Retriever::from_settings(&settings(&dir))?;
        let doc = retriever.ingest(DOCUMENTS[2])?;
        retriever.train(std::slice::from_ref(&doc), Some(2))?;
        doc
    };

    let reopened = Retriever::from_settings(&settings(&dir))?;
    assert!(!reopened.embedder().mode().is_degraded());
    assert_eq!(reopened.documents().len(), 1);
    let expected = split_into_chunks(DOCUMENTS[2], 60, 10)?.len();
    assert_eq!(reopened.status()?.records, expected);

    assert!(reopened.delete(&doc)?);
    assert!(reopened.search("cosine", 10)?.is_empty());

    let again = Retriever::from_settings(&settings(&dir))?;
    assert!(again.documents().is_empty());
    assert_eq!(again.status()?.records, 0);
    Ok(())
}

#[test]
fn test_train_rejects_empty_corpus() -> Result<()> {
    let dir = TempDir::new()?;
    let retriever = Retriever::from_settings(&settings(&dir))?;

    // Ids that could never have been generated read as unknown, not as failures
    for id in ["no-such-document", "foo_bar", "../x"] {
        let err = retriever.train(&[id.to_string()], None).unwrap_err();
        assert!(err.is_validation(), "{id}: unexpected error: {err}");
    }
    assert!(retriever.embedder().mode().is_degraded());
    Ok(())
}

#[test]
fn test_ingest_file_records_source_path() -> Result<()> {
    let dir = TempDir::new()?;
    let retriever = Retriever::from_settings(&settings(&dir))?;

    let path = dir.path().join("notes.md");
    std::fs::write(&path, "# Notes\n\nShort markdown body.")?;
    let doc = retriever.ingest_file(&path)?;

    let state = retriever.document(&doc).unwrap();
    assert_eq!(state.source_path.as_deref(), Some(path.as_path()));
    let record = retriever.store().get(&record_id(&doc, 0))?.unwrap();
    assert_eq!(record.metadata["source_path"], json!(path.to_string_lossy()));

    let unsupported = dir.path().join("image.png");
    std::fs::write(&unsupported, [0u8; 4])?;
    assert!(matches!(
        retriever.ingest_file(&unsupported),
        Err(RetrievalError::Extract(_))
    ));
    Ok(())
}

/// Chunk storage handing out preset ids, so tests can pick colliding names.
struct PresetIds {
    ids: Mutex<VecDeque<String>>,
    docs: Mutex<HashMap<String, Vec<String>>>,
}

impl ChunkStorage for PresetIds {
    fn save(&self, chunks: &[String]) -> StorageResult<String> {
        let id = self.ids.lock().pop_front().expect("test ran out of ids");
        self.docs.lock().insert(id.clone(), chunks.to_vec());
        Ok(id)
    }

    fn load(&self, document_id: &str) -> StorageResult<Vec<String>> {
        Ok(self.docs.lock().get(document_id).cloned().unwrap_or_default())
    }

    fn delete(&self, document_id: &str) -> StorageResult<()> {
        self.docs.lock().remove(document_id);
        Ok(())
    }
}

#[test]
fn test_delete_leaves_documents_with_shared_prefix() -> Result<()> {
    // "a_chunk_1_chunk_0" starts with "a_chunk_1", the id of doc "a" chunk 1
    let chunks = Arc::new(PresetIds {
        ids: Mutex::new(VecDeque::from(["a".to_string(), "a_chunk_1".to_string()])),
        docs: Mutex::new(HashMap::new()),
    });
    let store = Arc::new(MemoryVectorStore::new(4));
    let retriever = Retriever::new(
        ChunkingConfig::new(10, 0),
        Arc::new(PlaceholderEmbedder::new(4)),
        store.clone(),
        chunks,
        DocumentRegistry::in_memory(),
    )?;

    let first = retriever.ingest("0123456789abcdefghij")?;
    let second = retriever.ingest("klmnopqrst")?;
    assert_eq!(store.len()?, 3);

    assert!(retriever.delete(&first)?);
    assert_eq!(store.len()?, 1);
    assert!(store.get(&record_id(&second, 0))?.is_some());

    let results = retriever.search("anything", 10)?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata["document_id"], second.as_str());
    Ok(())
}

#[test]
fn test_concurrent_ingest_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let retriever = Retriever::from_settings(&settings(&dir))?;

    std::thread::scope(|scope| {
        for thread in 0..4 {
            let retriever = &retriever;
            scope.spawn(move || {
                for round in 0..5 {
                    let text = DOCUMENTS[(thread + round) % DOCUMENTS.len()];
                    retriever.ingest(text).unwrap();
                }
            });
        }
    });

    let expected_records: usize = (0..4)
        .flat_map(|thread| (0..5).map(move |round| (thread + round) % DOCUMENTS.len()))
        .map(|i| split_into_chunks(DOCUMENTS[i], 60, 10).unwrap().len())
        .sum();
    let before = retriever.status()?;
    assert_eq!(before.documents, 20);
    assert_eq!(before.records, expected_records);
    drop(retriever);

    // Neither the snapshot nor the registry lost a concurrent write
    let reopened = Retriever::from_settings(&settings(&dir))?;
    assert_eq!(reopened.documents().len(), 20);
    assert_eq!(reopened.status()?.records, expected_records);
    Ok(())
}

#[test]
fn test_concurrent_reembed_and_delete_leave_nothing_behind() -> Result<()> {
    let dir = TempDir::new()?;
    let store = Arc::new(MemoryVectorStore::new(4));
    let retriever = Retriever::new(
        ChunkingConfig::new(10, 0),
        Arc::new(PlaceholderEmbedder::new(4)),
        store.clone(),
        Arc::new(FileChunkStorage::new(dir.path())?),
        DocumentRegistry::in_memory(),
    )?;
    let text = "abcdefghij".repeat(30);

    for _ in 0..20 {
        let doc = retriever.ingest(&text)?;
        assert_eq!(store.len()?, 30);

        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..3 {
                        retriever.reembed(&doc).unwrap();
                    }
                });
            }
            scope.spawn(|| assert!(retriever.delete(&doc).unwrap()));
        });

        assert_eq!(store.len()?, 0, "records of {doc} outlived its delete");
        assert!(retriever.document(&doc).is_none());
        assert!(retriever.search("abcdefghij", 5)?.is_empty());
        assert!(!retriever.reembed(&doc)?);
    }
    Ok(())
}

#[test]
fn test_hash_backend_keeps_documents_in_process() -> Result<()> {
    let dir = TempDir::new()?;
    let mut settings = settings(&dir);
    settings.store.backend = StoreBackend::Hash;

    {
        let retriever = Retriever::from_settings(&settings)?;
        let doc = retriever.ingest(DOCUMENTS[1])?;
        assert_eq!(retriever.documents().len(), 1);
        assert!(retriever.status()?.records > 0);
        assert!(retriever.delete(&doc)?);
        retriever.ingest(DOCUMENTS[0])?;
    }
    assert!(!settings.data_dir().join(REGISTRY_FILE).exists());

    // The registry never points at records a fresh process cannot see
    let reopened = Retriever::from_settings(&settings)?;
    assert!(reopened.documents().is_empty());
    assert_eq!(reopened.status()?.records, 0);
    assert!(reopened.search("garbage collected", 5)?.is_empty());
    Ok(())
}
