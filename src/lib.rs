pub mod cli;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod logging;
pub mod retrieval;
pub mod runtime;
pub mod storage;
pub mod training;
pub mod utils;
pub mod vector;

pub use config::Settings;
pub use documents::{ChunkingConfig, DocumentState, split_into_chunks};
pub use embedding::{Embedder, EmbeddingMode, PlaceholderEmbedder, SkipGramEmbedder};
pub use error::{RetrievalError, RetrievalResult};
pub use retrieval::{Retriever, TrainingSummary};
pub use storage::{ChunkStorage, DocumentRegistry, FileChunkStorage};
pub use training::{ModelArtifacts, TrainingParams, Vocabulary};
pub use utils::calculate_hash;
pub use vector::{MemoryVectorStore, Metadata, QueryResult, VectorStore};
