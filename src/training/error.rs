use std::path::PathBuf;
use thiserror::Error;

/// Errors from training and from reading or writing model artifacts.
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Training corpus is empty: no tokens to build a vocabulary from")]
    EmptyCorpus,

    #[error(
        "Training corpus produced no context pairs ({tokens} tokens); every chunk needs at least two tokens"
    )]
    NoTrainingPairs { tokens: usize },

    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("Corrupt model artifact at {path}: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TrainingError {
    fn from(err: serde_json::Error) -> Self {
        TrainingError::Serialization(err.to_string())
    }
}

impl TrainingError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TrainingError::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type TrainingResult<T> = Result<T, TrainingError>;
