//! Training, artifact publication and the artifact-backed embedder together.

use anyhow::Result;
use std::fs;
use tempfile::TempDir;

use ragline::config::{OptimizerKind, TrainingConfig};
use ragline::training::{ModelArtifacts, TrainingError, TrainingParams, train};
use ragline::vector::cosine_similarity;
use ragline::{Embedder, EmbeddingMode, SkipGramEmbedder};

fn params(dimension: usize) -> TrainingParams {
    let config = TrainingConfig {
        window_size: 2,
        epochs: 20,
        learning_rate: 0.02,
        optimizer: OptimizerKind::Adam,
        seed: Some(9),
        ..TrainingConfig::default()
    };
    TrainingParams::new(dimension, &config)
}

fn corpus() -> Vec<String> {
    vec![
        "tokio spawns async tasks on a runtime".to_string(),
        "rayon splits work across a thread pool".to_string(),
        "serde derives serialize and deserialize".to_string(),
    ]
}

#[test]
fn test_missing_model_runs_degraded_with_zero_vectors() {
    let dir = TempDir::new().unwrap();
    let embedder = SkipGramEmbedder::open(dir.path(), 300);

    assert_eq!(embedder.mode(), EmbeddingMode::Degraded);
    let vectors = embedder.encode(&["a", "b"]).unwrap();
    assert_eq!(vectors.len(), 2);
    for vector in vectors {
        assert_eq!(vector.len(), 300);
        assert!(vector.iter().all(|v| *v == 0.0));
    }
}

#[test]
fn test_published_model_is_served_after_reload() -> Result<()> {
    let dir = TempDir::new()?;
    let embedder = SkipGramEmbedder::open(dir.path(), 12);
    assert!(embedder.mode().is_degraded());

    let model = train(&corpus(), &params(12))?;
    let manifest = ModelArtifacts::new(dir.path()).publish(&model, 3)?;

    assert!(embedder.reload()?);
    assert_eq!(embedder.generation(), Some(manifest.generation.clone()));
    assert_eq!(
        embedder.mode(),
        EmbeddingMode::Trained {
            generation: manifest.generation
        }
    );

    // A single known token embeds to exactly its table row
    let index = model.vocabulary.get("rayon").unwrap();
    let vector = embedder.encode(&["Rayon"])?.remove(0);
    assert_eq!(vector, model.row(index));

    // Unknown tokens contribute nothing; all-unknown text is a zero vector
    let mixed = embedder.encode(&["rayon quantum"])?.remove(0);
    assert_eq!(mixed, vector);
    let unknown = embedder.encode(&["quantum chromodynamics"])?.remove(0);
    assert!(unknown.iter().all(|v| *v == 0.0));

    // Identical texts give cosine 1
    let a = embedder.encode(&[corpus()[0].as_str()])?.remove(0);
    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
    Ok(())
}

#[test]
fn test_tampered_generation_is_not_loaded() -> Result<()> {
    let dir = TempDir::new()?;
    let artifacts = ModelArtifacts::new(dir.path());
    let manifest = artifacts.publish(&train(&corpus(), &params(8))?, 3)?;

    let weights = artifacts
        .generation_dir(&manifest.generation)
        .join(&manifest.weights_file);
    let mut bytes = fs::read(&weights)?;
    bytes[0] ^= 0xff;
    fs::write(&weights, bytes)?;

    assert!(matches!(
        artifacts.load_current(),
        Err(TrainingError::CorruptArtifact { .. })
    ));
    let embedder = SkipGramEmbedder::open(dir.path(), 8);
    assert!(embedder.mode().is_degraded());
    Ok(())
}

#[test]
fn test_dimension_mismatch_degrades() -> Result<()> {
    let dir = TempDir::new()?;
    ModelArtifacts::new(dir.path()).publish(&train(&corpus(), &params(8))?, 3)?;

    let embedder = SkipGramEmbedder::open(dir.path(), 16);
    assert!(embedder.mode().is_degraded());
    assert_eq!(embedder.encode(&["tokio"])?[0], vec![0.0; 16]);
    Ok(())
}

#[test]
fn test_training_rejects_unusable_corpora() {
    let empty: Vec<String> = Vec::new();
    assert!(matches!(
        train(&empty, &params(8)),
        Err(TrainingError::EmptyCorpus)
    ));
    assert!(matches!(
        train(&["   ", "\n\t"], &params(8)),
        Err(TrainingError::EmptyCorpus)
    ));
    // Single-token chunks yield no context pairs
    assert!(matches!(
        train(&["alpha", "beta"], &params(8)),
        Err(TrainingError::NoTrainingPairs { tokens: 2 })
    ));
}

#[test]
fn test_generations_are_pruned_but_current_survives() -> Result<()> {
    let dir = TempDir::new()?;
    let artifacts = ModelArtifacts::new(dir.path());
    let model = train(&corpus(), &params(8))?;

    let mut last = None;
    for _ in 0..4 {
        last = Some(artifacts.publish(&model, 2)?.generation);
    }

    let generations = artifacts.generations()?;
    assert_eq!(generations.len(), 2);
    assert!(generations.contains(last.as_ref().unwrap()));
    assert_eq!(
        artifacts.read_manifest()?.map(|m| m.generation),
        last
    );
    Ok(())
}
