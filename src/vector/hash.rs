//! Vector store over a key-value backend holding one hash per record.
//!
//! The layout matches what a networked hash store (Redis-style `HSET`) would
//! hold, see [`super::wire`]. [`InProcessHashBackend`] provides the same
//! semantics without a server.

use dashmap::DashMap;
use std::collections::HashMap;

use super::similarity::{cosine_with_norms, norm, rank};
use super::wire::{
    DEFAULT_KEY_PREFIX, METADATA_FIELD, VECTOR_FIELD, decode_metadata, decode_vector,
    encode_metadata, encode_vector, id_from_key, record_key,
};
use super::{
    Metadata, QueryResult, VectorRecord, VectorResult, VectorStore, validate_query,
    validate_vector,
};

/// Minimal hash-of-fields interface.
///
/// A single `hset` call must be atomic with respect to `hgetall` on the same
/// key, so readers never see a vector without its metadata.
pub trait HashBackend: Send + Sync {
    fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> VectorResult<()>;

    /// All fields of `key`, or `None` if the key is absent.
    fn hgetall(&self, key: &str) -> VectorResult<Option<HashMap<String, Vec<u8>>>>;

    /// Remove `key`; returns whether it existed.
    fn del(&self, key: &str) -> VectorResult<bool>;

    /// Every key starting with `prefix`, in no particular order.
    fn keys(&self, prefix: &str) -> VectorResult<Vec<String>>;
}

/// Sharded concurrent map standing in for a hash server.
#[derive(Debug, Default)]
pub struct InProcessHashBackend {
    entries: DashMap<String, HashMap<String, Vec<u8>>>,
}

impl InProcessHashBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashBackend for InProcessHashBackend {
    fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> VectorResult<()> {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert(field, value);
        }
        Ok(())
    }

    fn hgetall(&self, key: &str) -> VectorResult<Option<HashMap<String, Vec<u8>>>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    fn del(&self, key: &str) -> VectorResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> VectorResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

/// Vector store persisting each record as a hash under `prefix + id`.
///
/// Queries enumerate keys, fetch each record and score it. Records deleted
/// between enumeration and fetch are skipped; blobs of the wrong dimension
/// are skipped with a warning.
pub struct HashVectorStore<B: HashBackend> {
    backend: B,
    dimension: usize,
    prefix: String,
}

impl<B: HashBackend> HashVectorStore<B> {
    pub fn new(backend: B, dimension: usize) -> Self {
        Self::with_prefix(backend, dimension, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(backend: B, dimension: usize, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            dimension,
            prefix: prefix.into(),
        }
    }

    /// Sorted record keys, so scans and tie order are deterministic.
    fn record_keys(&self) -> VectorResult<Vec<String>> {
        let mut keys = self.backend.keys(&self.prefix)?;
        keys.sort_unstable();
        Ok(keys)
    }

    fn decode_record(&self, key: &str, fields: &HashMap<String, Vec<u8>>) -> Option<(Vec<f32>, Metadata)> {
        let blob = fields.get(VECTOR_FIELD)?;
        let vector = match decode_vector(blob) {
            Ok(vector) if vector.len() == self.dimension => vector,
            Ok(vector) => {
                tracing::warn!(
                    target: "vector",
                    "skipping '{key}': stored dimension {} != {}",
                    vector.len(),
                    self.dimension
                );
                return None;
            }
            Err(reason) => {
                tracing::warn!(target: "vector", "skipping '{key}': {reason}");
                return None;
            }
        };
        let metadata = fields
            .get(METADATA_FIELD)
            .map(|bytes| decode_metadata(bytes))
            .unwrap_or_default();
        Some((vector, metadata))
    }
}

impl<B: HashBackend> VectorStore for HashVectorStore<B> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn insert(&self, id: &str, vector: Vec<f32>, metadata: Metadata) -> VectorResult<()> {
        validate_vector(id, &vector, self.dimension)?;
        let fields = vec![
            (VECTOR_FIELD.to_string(), encode_vector(&vector)),
            (METADATA_FIELD.to_string(), encode_metadata(&metadata)?),
        ];
        self.backend.hset(&record_key(&self.prefix, id), fields)
    }

    fn query(&self, vector: &[f32], top_k: usize) -> VectorResult<Vec<QueryResult>> {
        validate_query(vector, self.dimension)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = norm(vector);
        let mut scored = Vec::new();
        for key in self.record_keys()? {
            let Some(id) = id_from_key(&self.prefix, &key) else {
                continue;
            };
            // Deleted since enumeration
            let Some(fields) = self.backend.hgetall(&key)? else {
                continue;
            };
            let Some((stored, metadata)) = self.decode_record(&key, &fields) else {
                continue;
            };
            scored.push(QueryResult {
                id: id.to_string(),
                score: cosine_with_norms(vector, query_norm, &stored, norm(&stored)),
                metadata,
            });
        }

        Ok(rank(scored, top_k))
    }

    fn delete(&self, id: &str) -> VectorResult<()> {
        self.backend.del(&record_key(&self.prefix, id))?;
        Ok(())
    }

    fn get(&self, id: &str) -> VectorResult<Option<VectorRecord>> {
        let key = record_key(&self.prefix, id);
        let Some(fields) = self.backend.hgetall(&key)? else {
            return Ok(None);
        };
        Ok(self
            .decode_record(&key, &fields)
            .map(|(vector, metadata)| VectorRecord {
                id: id.to_string(),
                vector,
                metadata,
            }))
    }

    fn len(&self) -> VectorResult<usize> {
        Ok(self.backend.keys(&self.prefix)?.len())
    }

    /// The backend is the durable state.
    fn persist(&self) -> VectorResult<()> {
        Ok(())
    }

    fn load(&self) -> VectorResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn store(dimension: usize) -> HashVectorStore<InProcessHashBackend> {
        HashVectorStore::new(InProcessHashBackend::new(), dimension)
    }

    #[test]
    fn test_records_use_wire_layout() {
        let store = store(2);
        let mut metadata = Metadata::new();
        metadata.insert("content".into(), json!("hello"));
        store.insert("doc_chunk_0", vec![1.0, 2.0], metadata.clone()).unwrap();

        let fields = store.backend.hgetall("vec:doc_chunk_0").unwrap().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[VECTOR_FIELD], encode_vector(&[1.0, 2.0]));
        assert_eq!(decode_metadata(&fields[METADATA_FIELD]), metadata);
    }

    #[test]
    fn test_query_ranks_and_skips_foreign_keys() {
        let store = store(2);
        store.insert("near", vec![1.0, 0.1], Metadata::new()).unwrap();
        store.insert("far", vec![-1.0, 0.0], Metadata::new()).unwrap();
        store
            .backend
            .hset("session:1", vec![(VECTOR_FIELD.into(), encode_vector(&[1.0, 0.0]))])
            .unwrap();

        let results = store.query(&[1.0, 0.0], 10).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_wrong_dimension_blob_skipped() {
        let store = store(2);
        store.insert("good", vec![1.0, 0.0], Metadata::new()).unwrap();
        store
            .backend
            .hset(
                "vec:stale",
                vec![(VECTOR_FIELD.into(), encode_vector(&[1.0, 0.0, 0.0]))],
            )
            .unwrap();
        store
            .backend
            .hset("vec:torn", vec![(VECTOR_FIELD.into(), vec![1, 2, 3])])
            .unwrap();

        let results = store.query(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "good");
        assert!(store.get("stale").unwrap().is_none());
    }

    #[test]
    fn test_missing_metadata_reads_empty() {
        let store = store(2);
        store
            .backend
            .hset("vec:bare", vec![(VECTOR_FIELD.into(), encode_vector(&[0.0, 1.0]))])
            .unwrap();
        let record = store.get("bare").unwrap().unwrap();
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn test_delete_and_ties() {
        let store = store(2);
        for id in ["c", "a", "b"] {
            store.insert(id, vec![1.0, 1.0], Metadata::new()).unwrap();
        }
        store.delete("c").unwrap();
        store.delete("unknown").unwrap();

        // Equal scores come back in key order
        let ids: Vec<String> = store
            .query(&[1.0, 1.0], 5)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(store(3));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .insert(&format!("{t}:{i}"), vec![1.0, t as f32, i as f32], Metadata::new())
                            .unwrap();
                        store.query(&[1.0, 0.0, 0.0], 3).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len().unwrap(), 100);
    }
}
