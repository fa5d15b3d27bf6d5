//! In-process vector store with an optional JSON snapshot.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::similarity::{cosine_with_norms, norm, rank};
use super::{
    Metadata, QueryResult, VectorError, VectorRecord, VectorResult, VectorStore, validate_query,
    validate_vector,
};
use crate::storage::write_atomic;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
struct StoredVector {
    vector: Vec<f32>,
    norm: f32,
    metadata: Metadata,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    dimension: usize,
    records: Vec<VectorRecord>,
}

/// Ordered map of records behind a read-write lock.
///
/// Ties in similarity are returned in first-insertion order; overwriting a
/// record keeps its original position.
#[derive(Debug)]
pub struct MemoryVectorStore {
    dimension: usize,
    records: RwLock<IndexMap<String, StoredVector>>,
    snapshot_path: Option<PathBuf>,
    /// Held across snapshot and rename so an older snapshot never lands last.
    persist_lock: Mutex<()>,
}

impl MemoryVectorStore {
    /// Purely in-memory store; `persist`/`load` do nothing.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(IndexMap::new()),
            snapshot_path: None,
            persist_lock: Mutex::new(()),
        }
    }

    /// Store backed by a snapshot file, loaded immediately if it exists.
    pub fn with_snapshot(dimension: usize, path: impl AsRef<Path>) -> VectorResult<Self> {
        let store = Self {
            snapshot_path: Some(path.as_ref().to_path_buf()),
            ..Self::new(dimension)
        };
        store.load()?;
        Ok(store)
    }
}

impl VectorStore for MemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn insert(&self, id: &str, vector: Vec<f32>, metadata: Metadata) -> VectorResult<()> {
        validate_vector(id, &vector, self.dimension)?;
        let norm = norm(&vector);
        self.records.write().insert(
            id.to_string(),
            StoredVector {
                vector,
                norm,
                metadata,
            },
        );
        Ok(())
    }

    fn query(&self, vector: &[f32], top_k: usize) -> VectorResult<Vec<QueryResult>> {
        validate_query(vector, self.dimension)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = norm(vector);
        let scored = {
            let records = self.records.read();
            records
                .iter()
                .map(|(id, stored)| QueryResult {
                    id: id.clone(),
                    score: cosine_with_norms(vector, query_norm, &stored.vector, stored.norm),
                    metadata: stored.metadata.clone(),
                })
                .collect::<Vec<_>>()
        };

        Ok(rank(scored, top_k))
    }

    fn delete(&self, id: &str) -> VectorResult<()> {
        self.records.write().shift_remove(id);
        Ok(())
    }

    fn get(&self, id: &str) -> VectorResult<Option<VectorRecord>> {
        Ok(self.records.read().get(id).map(|stored| VectorRecord {
            id: id.to_string(),
            vector: stored.vector.clone(),
            metadata: stored.metadata.clone(),
        }))
    }

    fn len(&self) -> VectorResult<usize> {
        Ok(self.records.read().len())
    }

    fn persist(&self) -> VectorResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let _guard = self.persist_lock.lock();
        let snapshot = {
            let records = self.records.read();
            Snapshot {
                version: SNAPSHOT_VERSION,
                dimension: self.dimension,
                records: records
                    .iter()
                    .map(|(id, stored)| VectorRecord {
                        id: id.clone(),
                        vector: stored.vector.clone(),
                        metadata: stored.metadata.clone(),
                    })
                    .collect(),
            }
        };

        let content = serde_json::to_vec(&snapshot)?;
        write_atomic(path, &content)?;

        tracing::debug!(
            target: "vector",
            "persisted {} records to {}",
            snapshot.records.len(),
            path.display()
        );
        Ok(())
    }

    fn load(&self) -> VectorResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&content)?;
        if snapshot.dimension != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: snapshot.dimension,
            });
        }

        let mut loaded = IndexMap::with_capacity(snapshot.records.len());
        for record in snapshot.records {
            validate_vector(&record.id, &record.vector, self.dimension)?;
            let norm = norm(&record.vector);
            loaded.insert(
                record.id,
                StoredVector {
                    vector: record.vector,
                    norm,
                    metadata: record.metadata,
                },
            );
        }

        tracing::debug!(
            target: "vector",
            "loaded {} records from {}",
            loaded.len(),
            path.display()
        );
        *self.records.write() = loaded;
        Ok(())
    }
}
