//! Publishing and loading trained vocabulary/weight pairs.
//!
//! Layout under the model directory:
//!
//! ```text
//! current.json                      manifest naming the live generation
//! generations/<generation>/vocab.json
//! generations/<generation>/weights.bin
//! ```
//!
//! A generation directory is complete before it becomes visible: files are
//! written to a staging directory and renamed into `generations/`. The
//! manifest is replaced atomically afterwards, so readers resolving through
//! it always get a matching pair.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::{TrainingError, TrainingResult};
use super::trainer::TrainedModel;
use super::vocab::Vocabulary;
use crate::storage::write_atomic;
use crate::utils::calculate_hash;
use crate::vector::wire::{decode_vector, encode_vector};

pub const MANIFEST_FILE: &str = "current.json";
pub const GENERATIONS_DIR: &str = "generations";
pub const VOCAB_FILE: &str = "vocab.json";
pub const WEIGHTS_FILE: &str = "weights.bin";

const MANIFEST_VERSION: u32 = 1;

/// Contents of `current.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    pub generation: String,
    pub vocab_size: usize,
    pub dimension: usize,
    pub vocab_file: String,
    pub weights_file: String,
    pub vocab_sha256: String,
    pub weights_sha256: String,
    pub epochs: usize,
    #[serde(default)]
    pub final_loss: Option<f32>,
    pub created_at: DateTime<Utc>,
}

/// A validated vocabulary/weights pair read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub manifest: ArtifactManifest,
    pub vocabulary: Vocabulary,
    /// Row-major `vocab_size × dimension`
    pub embeddings: Vec<f32>,
}

/// Handle on a model directory.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    root: PathBuf,
}

impl ModelArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(GENERATIONS_DIR).join(generation)
    }

    /// Write `model` as a new generation and make it current.
    ///
    /// Generations beyond the newest `keep_generations` are removed afterwards.
    pub fn publish(
        &self,
        model: &TrainedModel,
        keep_generations: usize,
    ) -> TrainingResult<ArtifactManifest> {
        let generations = self.root.join(GENERATIONS_DIR);
        fs::create_dir_all(&generations)?;

        let vocab_bytes = serde_json::to_vec_pretty(&model.vocabulary.to_index_map())?;
        let weights_bytes = encode_vector(&model.embeddings);

        let generation = new_generation_id();
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;
        write_synced(&staging.path().join(VOCAB_FILE), &vocab_bytes)?;
        write_synced(&staging.path().join(WEIGHTS_FILE), &weights_bytes)?;

        let target = self.generation_dir(&generation);
        fs::rename(staging.path(), &target)?;
        // Staging is gone now; dropping the guard finds nothing to remove.
        drop(staging);

        let manifest = ArtifactManifest {
            version: MANIFEST_VERSION,
            generation: generation.clone(),
            vocab_size: model.vocabulary.len(),
            dimension: model.dimension,
            vocab_file: VOCAB_FILE.to_string(),
            weights_file: WEIGHTS_FILE.to_string(),
            vocab_sha256: calculate_hash(&vocab_bytes),
            weights_sha256: calculate_hash(&weights_bytes),
            epochs: model.report.epochs(),
            final_loss: model.report.final_loss(),
            created_at: Utc::now(),
        };
        write_atomic(
            &self.manifest_path(),
            &serde_json::to_vec_pretty(&manifest)?,
        )?;

        tracing::info!(
            target: "training",
            "published generation {generation} ({} tokens x {} dims) to {}",
            manifest.vocab_size,
            manifest.dimension,
            target.display()
        );

        self.prune(keep_generations, &generation);
        Ok(manifest)
    }

    /// The current manifest, or `None` if nothing was ever published.
    pub fn read_manifest(&self) -> TrainingResult<Option<ArtifactManifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read(&path)?;
        let manifest = serde_json::from_slice(&content)
            .map_err(|e| TrainingError::corrupt(&path, e.to_string()))?;
        Ok(Some(manifest))
    }

    /// Load and validate the pair named by the manifest.
    pub fn load_current(&self) -> TrainingResult<Option<LoadedArtifact>> {
        let Some(manifest) = self.read_manifest()? else {
            return Ok(None);
        };
        let dir = self.generation_dir(&manifest.generation);

        let vocab_path = dir.join(&manifest.vocab_file);
        let vocab_bytes = fs::read(&vocab_path)?;
        verify_hash(&vocab_path, &vocab_bytes, &manifest.vocab_sha256)?;
        let map: IndexMap<String, usize> = serde_json::from_slice(&vocab_bytes)
            .map_err(|e| TrainingError::corrupt(&vocab_path, e.to_string()))?;
        let vocabulary = Vocabulary::from_index_map(map)
            .map_err(|reason| TrainingError::corrupt(&vocab_path, reason))?;
        if vocabulary.len() != manifest.vocab_size {
            return Err(TrainingError::corrupt(
                &vocab_path,
                format!(
                    "{} tokens, manifest says {}",
                    vocabulary.len(),
                    manifest.vocab_size
                ),
            ));
        }

        let weights_path = dir.join(&manifest.weights_file);
        let weights_bytes = fs::read(&weights_path)?;
        verify_hash(&weights_path, &weights_bytes, &manifest.weights_sha256)?;
        let expected_len = manifest
            .vocab_size
            .checked_mul(manifest.dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                TrainingError::corrupt(
                    &weights_path,
                    format!(
                        "manifest shape {}x{} overflows",
                        manifest.vocab_size, manifest.dimension
                    ),
                )
            })?;
        if weights_bytes.len() != expected_len {
            return Err(TrainingError::corrupt(
                &weights_path,
                format!(
                    "{} bytes, expected {} for {}x{} f32",
                    weights_bytes.len(),
                    expected_len,
                    manifest.vocab_size,
                    manifest.dimension
                ),
            ));
        }
        let embeddings = decode_vector(&weights_bytes)
            .map_err(|reason| TrainingError::corrupt(&weights_path, reason))?;

        Ok(Some(LoadedArtifact {
            manifest,
            vocabulary,
            embeddings,
        }))
    }

    /// Generation ids on disk, oldest first.
    pub fn generations(&self) -> TrainingResult<Vec<String>> {
        let dir = self.root.join(GENERATIONS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove all but the newest `keep` generations. `current` always survives.
    fn prune(&self, keep: usize, current: &str) {
        let ids = match self.generations() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(target: "training", "could not list generations: {e}");
                return;
            }
        };
        let older: Vec<&String> = ids.iter().filter(|id| id.as_str() != current).collect();
        let stale = older.len().saturating_sub(keep.saturating_sub(1));
        for id in older.into_iter().take(stale) {
            let dir = self.generation_dir(id);
            match fs::remove_dir_all(&dir) {
                Ok(()) => tracing::debug!(target: "training", "pruned generation {id}"),
                Err(e) => tracing::warn!(
                    target: "training",
                    "failed to prune {}: {e}",
                    dir.display()
                ),
            }
        }
    }
}

/// Sortable by creation time, unique across concurrent publishers.
fn new_generation_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}",
        Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
        &suffix[..8]
    )
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn verify_hash(path: &Path, bytes: &[u8], expected: &str) -> TrainingResult<()> {
    let actual = calculate_hash(bytes);
    if actual != expected {
        return Err(TrainingError::corrupt(
            path,
            format!("sha256 {actual} does not match manifest {expected}"),
        ));
    }
    Ok(())
}
