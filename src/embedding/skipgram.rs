//! Artifact-backed embedder over a trained skip-gram table.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{EmbedError, EmbedResult, Embedder, EmbeddingMode};
use crate::training::{LoadedArtifact, ModelArtifacts, Vocabulary};
use crate::utils::tokenize;

/// Immutable snapshot of one loaded generation.
#[derive(Debug)]
struct ModelState {
    generation: String,
    vocabulary: Vocabulary,
    embeddings: Vec<f32>,
    dimension: usize,
}

impl ModelState {
    fn from_artifact(artifact: LoadedArtifact) -> Self {
        Self {
            generation: artifact.manifest.generation,
            vocabulary: artifact.vocabulary,
            embeddings: artifact.embeddings,
            dimension: artifact.manifest.dimension,
        }
    }

    /// Mean of the rows of the known tokens; zero when none are known.
    fn embed(&self, text: &str) -> Vec<f32> {
        let d = self.dimension;
        let mut sum = vec![0.0f32; d];
        let mut known = 0usize;
        for token in tokenize(text) {
            if let Some(idx) = self.vocabulary.get(&token) {
                for (acc, v) in sum.iter_mut().zip(&self.embeddings[idx * d..(idx + 1) * d]) {
                    *acc += v;
                }
                known += 1;
            }
        }
        if known > 0 {
            let scale = 1.0 / known as f32;
            sum.iter_mut().for_each(|v| *v *= scale);
        }
        sum
    }
}

/// Embedder reading the current generation from a model directory.
///
/// Without a loadable generation it runs degraded and returns zero vectors.
/// [`Embedder::reload`] swaps in a newer generation without blocking readers
/// for longer than a pointer copy; each `encode` call sees one generation.
pub struct SkipGramEmbedder {
    dimension: usize,
    artifacts: ModelArtifacts,
    state: RwLock<Option<Arc<ModelState>>>,
    warned: AtomicBool,
}

impl SkipGramEmbedder {
    /// Open `model_dir`, falling back to degraded mode if nothing loads.
    pub fn open(model_dir: impl AsRef<Path>, dimension: usize) -> Self {
        let embedder = Self {
            dimension,
            artifacts: ModelArtifacts::new(model_dir.as_ref()),
            state: RwLock::new(None),
            warned: AtomicBool::new(false),
        };
        match embedder.load_state() {
            Ok(Some(state)) => {
                tracing::info!(
                    target: "embedding",
                    "loaded model generation {} ({} tokens)",
                    state.generation,
                    state.vocabulary.len()
                );
                *embedder.state.write() = Some(Arc::new(state));
            }
            Ok(None) => embedder.warn_degraded("no model published yet"),
            Err(e) => embedder.warn_degraded(&e.to_string()),
        }
        embedder
    }

    /// Generation currently in use, if any.
    pub fn generation(&self) -> Option<String> {
        self.state.read().as_ref().map(|s| s.generation.clone())
    }

    fn load_state(&self) -> EmbedResult<Option<ModelState>> {
        let artifact = self
            .artifacts
            .load_current()
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?;
        let Some(artifact) = artifact else {
            return Ok(None);
        };
        if artifact.manifest.dimension != self.dimension {
            return Err(EmbedError::ModelLoad(format!(
                "generation {} has dimension {}, configured dimension is {}",
                artifact.manifest.generation, artifact.manifest.dimension, self.dimension
            )));
        }
        Ok(Some(ModelState::from_artifact(artifact)))
    }

    fn warn_degraded(&self, reason: &str) {
        self.warned.store(true, Ordering::Relaxed);
        tracing::warn!(
            target: "embedding",
            "embedder degraded ({reason}); vectors will be all zeros until a model is trained"
        );
    }
}

impl Embedder for SkipGramEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[&str]) -> EmbedResult<Vec<Vec<f32>>> {
        let state = self.state.read().clone();
        let Some(model) = state else {
            if !self.warned.swap(true, Ordering::Relaxed) {
                self.warn_degraded("no model loaded");
            }
            return Ok(vec![vec![0.0; self.dimension]; texts.len()]);
        };
        Ok(texts.par_iter().map(|text| model.embed(text)).collect())
    }

    fn mode(&self) -> EmbeddingMode {
        match self.state.read().as_ref() {
            Some(state) => EmbeddingMode::Trained {
                generation: state.generation.clone(),
            },
            None => EmbeddingMode::Degraded,
        }
    }

    fn reload(&self) -> EmbedResult<bool> {
        let current = self.generation();
        match self.load_state() {
            Ok(Some(state)) => {
                if current.as_deref() == Some(state.generation.as_str()) {
                    return Ok(false);
                }
                tracing::info!(
                    target: "embedding",
                    "switching to model generation {}",
                    state.generation
                );
                *self.state.write() = Some(Arc::new(state));
                Ok(true)
            }
            Ok(None) if current.is_none() => {
                self.warn_degraded("no model published yet");
                Ok(false)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                if current.is_some() {
                    // Keep serving the generation already in memory
                    tracing::warn!(target: "embedding", "reload failed, keeping current model: {e}");
                } else {
                    self.warn_degraded(&e.to_string());
                }
                Ok(false)
            }
        }
    }
}
