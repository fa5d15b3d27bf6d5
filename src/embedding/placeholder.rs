use std::sync::Once;

use super::{EmbedResult, Embedder, EmbeddingMode};

/// Embedder with no model: every text maps to the zero vector.
///
/// Search still runs end to end, but every score is 0 and results come back
/// in store order.
#[derive(Debug)]
pub struct PlaceholderEmbedder {
    dimension: usize,
    warned: Once,
}

impl PlaceholderEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            warned: Once::new(),
        }
    }
}

impl Embedder for PlaceholderEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[&str]) -> EmbedResult<Vec<Vec<f32>>> {
        self.warned.call_once(|| {
            tracing::warn!(
                target: "embedding",
                "no trained model available, encoding as zero vectors"
            );
        });
        Ok(vec![vec![0.0; self.dimension]; texts.len()])
    }

    fn mode(&self) -> EmbeddingMode {
        EmbeddingMode::Degraded
    }
}
