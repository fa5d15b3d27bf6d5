//! Skip-gram training engine.
//!
//! - [`Vocabulary`] and [`training_pairs`]: corpus preparation
//! - [`train`]: embedding table training with Adam or SGD
//! - [`ModelArtifacts`]: atomic publication of vocabulary/weight generations

pub mod artifacts;
mod error;
pub mod trainer;
pub mod vocab;

pub use artifacts::{ArtifactManifest, LoadedArtifact, ModelArtifacts};
pub use error::{TrainingError, TrainingResult};
pub use trainer::{TrainedModel, TrainingParams, TrainingReport, train};
pub use vocab::{Vocabulary, training_pairs};
