//! Error type for the retrieval orchestrator.
//!
//! Each subsystem keeps its own `thiserror` enum; [`RetrievalError`] wraps
//! them so callers of [`crate::Retriever`] match on one type.

use std::time::Duration;
use thiserror::Error;

use crate::documents::{ChunkingError, ExtractError};
use crate::embedding::EmbedError;
use crate::storage::StorageError;
use crate::training::TrainingError;
use crate::vector::VectorError;

#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Caller input rejected before any state changed.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Chunking(#[from] ChunkingError),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Vector store error: {0}")]
    Vector(#[from] VectorError),

    #[error("Chunk storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("Text extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl RetrievalError {
    /// Whether the caller sent something unusable, as opposed to a backend fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RetrievalError::Validation(_)
                | RetrievalError::Chunking(_)
                | RetrievalError::Vector(VectorError::DimensionMismatch { .. })
                | RetrievalError::Training(
                    TrainingError::EmptyCorpus
                        | TrainingError::NoTrainingPairs { .. }
                        | TrainingError::InvalidConfig(_)
                )
        )
    }
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
