//! Vector storage with linear-scan cosine search.
//!
//! Every store implements [`VectorStore`]:
//! - `insert` upserts by id and rejects vectors of the wrong dimension
//! - `query` scores every stored vector against the query, O(n·d)
//! - `delete` removes by id, unknown ids are a no-op
//! - `persist`/`load` flush and reload durable state (no-ops for durable backends)
//!
//! Scans never observe a half-applied write: [`MemoryVectorStore`] scans under
//! a read lock, [`HashVectorStore`] reads each record under its key's lock.

mod error;
pub mod hash;
pub mod memory;
pub mod similarity;
pub mod wire;

pub use error::{VectorError, VectorResult};
pub use hash::{HashBackend, HashVectorStore, InProcessHashBackend};
pub use memory::MemoryVectorStore;
pub use similarity::{SIMILARITY_EPSILON, cosine_similarity};

use serde::{Deserialize, Serialize};

/// Arbitrary JSON metadata attached to a record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A stored vector with its id and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One ranked match from [`VectorStore::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
    pub metadata: Metadata,
}

/// Storage contract shared by all vector backends.
pub trait VectorStore: Send + Sync {
    /// Length every stored and queried vector must have.
    fn dimension(&self) -> usize;

    /// Insert or overwrite the record `id`.
    fn insert(&self, id: &str, vector: Vec<f32>, metadata: Metadata) -> VectorResult<()>;

    /// The `top_k` most similar records, best first. `top_k == 0` yields nothing.
    fn query(&self, vector: &[f32], top_k: usize) -> VectorResult<Vec<QueryResult>>;

    /// Remove `id` if present.
    fn delete(&self, id: &str) -> VectorResult<()>;

    fn get(&self, id: &str) -> VectorResult<Option<VectorRecord>>;

    /// Number of stored records.
    fn len(&self) -> VectorResult<usize>;

    fn is_empty(&self) -> VectorResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush durable state.
    fn persist(&self) -> VectorResult<()>;

    /// Reload durable state.
    fn load(&self) -> VectorResult<()>;
}

/// Reject vectors of the wrong length or with NaN/inf components.
pub(crate) fn validate_vector(id: &str, vector: &[f32], dimension: usize) -> VectorResult<()> {
    if vector.len() != dimension {
        return Err(VectorError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(VectorError::NonFinite { id: id.to_string() });
    }
    Ok(())
}

/// Reject query vectors of the wrong length.
pub(crate) fn validate_query(vector: &[f32], dimension: usize) -> VectorResult<()> {
    if vector.len() != dimension {
        return Err(VectorError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    Ok(())
}
