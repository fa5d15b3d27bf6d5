//! Text to vector encoding.
//!
//! [`Embedder`] is the seam between the orchestrator and whatever produces
//! vectors. Two implementations ship:
//! - [`PlaceholderEmbedder`]: always degraded, all-zero vectors
//! - [`SkipGramEmbedder`]: mean of trained token rows, degraded until a model
//!   artifact is published

mod placeholder;
mod skipgram;

pub use placeholder::PlaceholderEmbedder;
pub use skipgram::SkipGramEmbedder;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from embedding operations.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Operation not supported by this embedder: {0}")]
    Unsupported(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),
}

pub type EmbedResult<T> = Result<T, EmbedError>;

/// Where an embedder's vectors come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// A published model generation is loaded.
    Trained { generation: String },
    /// No usable model; every vector is zero.
    Degraded,
}

impl EmbeddingMode {
    pub fn label(&self) -> &'static str {
        match self {
            EmbeddingMode::Trained { .. } => "trained",
            EmbeddingMode::Degraded => "degraded",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, EmbeddingMode::Degraded)
    }
}

impl std::fmt::Display for EmbeddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingMode::Trained { generation } => write!(f, "trained ({generation})"),
            EmbeddingMode::Degraded => f.write_str("degraded"),
        }
    }
}

/// Encodes text batches into fixed-dimension vectors.
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by [`Embedder::encode`].
    fn dimension(&self) -> usize;

    /// One vector per input, in input order. Never fails in degraded mode.
    fn encode(&self, texts: &[&str]) -> EmbedResult<Vec<Vec<f32>>>;

    fn mode(&self) -> EmbeddingMode;

    /// Fit the embedder on `corpus` directly.
    ///
    /// Artifact-backed embedders are trained through the training engine
    /// instead and keep this default.
    fn train(&self, _corpus: &[String]) -> EmbedResult<()> {
        Err(EmbedError::Unsupported(
            "train the model through the training engine and reload".to_string(),
        ))
    }

    /// Pick up a newly published model. Returns whether the model changed.
    fn reload(&self) -> EmbedResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serializes_tagged() {
        let trained = EmbeddingMode::Trained {
            generation: "g1".to_string(),
        };
        let json = serde_json::to_value(&trained).unwrap();
        assert_eq!(json["mode"], "trained");
        assert_eq!(json["generation"], "g1");

        let degraded = serde_json::to_value(EmbeddingMode::Degraded).unwrap();
        assert_eq!(degraded, serde_json::json!({"mode": "degraded"}));

        let back: EmbeddingMode = serde_json::from_value(json).unwrap();
        assert_eq!(back, trained);
        assert_eq!(back.label(), "trained");
        assert!(!back.is_degraded());
    }

    #[test]
    fn test_train_unsupported_by_default() {
        let embedder = PlaceholderEmbedder::new(4);
        assert!(matches!(
            embedder.train(&["some text".to_string()]),
            Err(EmbedError::Unsupported(_))
        ));
        assert!(!embedder.reload().unwrap());
    }
}
