//! Configuration module for the retrieval pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `RAGLINE_` and use double
//! underscores to separate nested levels:
//! - `RAGLINE_CHUNKING__MAX_CHUNK_CHARS=800` sets `chunking.max_chunk_chars`
//! - `RAGLINE_TRAINING__EPOCHS=50` sets `training.epochs`
//! - `RAGLINE_EMBEDDING__DIMENSION=128` sets `embedding.dimension`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::documents::ChunkingConfig;

/// Directory holding the settings file, searched for from the current directory upwards.
pub const CONFIG_DIR: &str = ".ragline";
const SETTINGS_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "RAGLINE_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory for chunk storage, the document registry and vector snapshots
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Workspace root directory (where .ragline is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Length of every embedding vector
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Directory holding published vocabulary/weight generations
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrainingConfig {
    /// Context tokens considered on each side of a centre token
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Passes over the full pair set
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    #[serde(default)]
    pub optimizer: OptimizerKind,

    /// Seed for weight initialisation and pair shuffling. Random when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Number of published generations kept on disk (the current one included)
    #[serde(default = "default_keep_generations")]
    pub keep_generations: usize,
}

/// Gradient update rule used by the trainer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Key namespace for the hash backend
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Write a snapshot of the memory store on persist()
    #[serde(default = "default_true")]
    pub snapshot: bool,
}

/// Vector store implementation selected at startup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process ordered map with an optional JSON snapshot.
    #[default]
    Memory,
    /// Hash-per-key layout matching the remote key-value wire shape.
    Hash,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuntimeConfig {
    /// Upper bound for a single ingest/search/delete call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `training = "info"`
    #[serde(default)]
    pub modules: IndexMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".ragline/data")
}
fn default_model_dir() -> PathBuf {
    PathBuf::from(".ragline/models")
}
fn default_dimension() -> usize {
    300
}
fn default_window_size() -> usize {
    2
}
fn default_epochs() -> usize {
    10
}
fn default_learning_rate() -> f32 {
    0.001
}
fn default_keep_generations() -> usize {
    2
}
fn default_key_prefix() -> String {
    "vec:".to_string()
}
fn default_true() -> bool {
    true
}
fn default_top_k() -> usize {
    5
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            workspace_root: None,
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            training: TrainingConfig::default(),
            store: StoreConfig::default(),
            search: SearchConfig::default(),
            runtime: RuntimeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            model_dir: default_model_dir(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            optimizer: OptimizerKind::default(),
            seed: None,
            keep_generations: default_keep_generations(),
        }
    }
}

impl TrainingConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("window_size must be at least 1".to_string());
        }
        if self.epochs == 0 {
            return Err("epochs must be at least 1".to_string());
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(format!(
                "learning_rate ({}) must be a positive finite number",
                self.learning_rate
            ));
        }
        if self.keep_generations == 0 {
            return Err("keep_generations must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            key_prefix: default_key_prefix(),
            snapshot: default_true(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: IndexMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .ragline directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                // If workspace_root is not set in config, detect it
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels, single underscore stays
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find the workspace root by looking for .ragline directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(SETTINGS_FILE))
    }

    /// Get the workspace root directory (where .ragline is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Resolve a configured path against the workspace root.
    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.resolve(&self.data_dir)
    }

    /// Effective model artifact directory.
    pub fn model_dir(&self) -> PathBuf {
        self.resolve(&self.embedding.model_dir)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.chunking.validate()?;
        self.training.validate()?;
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be at least 1".to_string());
        }
        if self.store.key_prefix.is_empty() {
            return Err("store.key_prefix must not be empty".to_string());
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let settings = Settings::default();
        settings.save(&config_path)?;

        Ok(config_path)
    }
}
