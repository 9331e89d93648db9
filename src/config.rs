//! Declarative run configuration
//!
//! A run is described by one YAML file deserialized into [`RunSpec`] and
//! validated once at start; every component treats the spec as immutable for
//! the duration of the run.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete specification of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    /// Dataset release name, used to name output artifacts
    pub release: String,

    /// Data configuration
    pub data: DataConfig,

    /// Model dimensions
    #[serde(default)]
    pub model: ModelConfig,

    /// Optimizer configuration
    #[serde(default)]
    pub optimizer: OptimConfig,

    /// Training hyperparameters
    #[serde(default)]
    pub training: TrainingConfig,

    /// Output directories
    #[serde(default)]
    pub output: OutputConfig,
}

/// Dataset locations and shaping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Training release file (JSON lines)
    pub train: PathBuf,

    /// Validation release file (JSON lines)
    pub valid: PathBuf,

    /// Maximum lines kept per file
    #[serde(default = "default_max_file_lines")]
    pub max_file_lines: usize,

    /// Token ids per line (padded / truncated)
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Hashed vocabulary size
    #[serde(default = "default_vocab_size")]
    pub vocab_size: u32,
}

/// Attention network dimensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Line embedding dimension
    #[serde(default = "default_embed_dim")]
    pub embed_dim: usize,

    /// Hidden projection dimension
    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: usize,
}

/// Optimizer hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimConfig {
    /// Learning rate
    #[serde(default = "default_lr")]
    pub lr: f32,
}

/// Loop-level hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of epochs
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Examples per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Blend hyperparameter `k`: ceiling on the line-loss share
    #[serde(default = "default_blend_k")]
    pub blend_k: f32,

    /// Gradient clip threshold (global norm); absent disables clipping
    #[serde(default = "default_max_grad_norm")]
    pub max_grad_norm: Option<f32>,

    /// Seed for parameter init and epoch shuffling
    #[serde(default)]
    pub seed: u64,
}

/// Output artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the final checkpoint
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Directory receiving the per-epoch metrics table
    #[serde(default = "default_loss_dir")]
    pub loss_dir: PathBuf,
}

fn default_max_file_lines() -> usize {
    1000
}
fn default_token_budget() -> usize {
    100
}
fn default_vocab_size() -> u32 {
    50_000
}
fn default_embed_dim() -> usize {
    64
}
fn default_hidden_dim() -> usize {
    64
}
fn default_lr() -> f32 {
    0.001
}
fn default_epochs() -> usize {
    10
}
fn default_batch_size() -> usize {
    16
}
fn default_blend_k() -> f32 {
    0.2
}
fn default_max_grad_norm() -> Option<f32> {
    Some(5.0)
}
fn default_model_dir() -> PathBuf {
    PathBuf::from("output/model")
}
fn default_loss_dir() -> PathBuf {
    PathBuf::from("output/loss")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embed_dim: default_embed_dim(),
            hidden_dim: default_hidden_dim(),
        }
    }
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self { lr: default_lr() }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            blend_k: default_blend_k(),
            max_grad_norm: default_max_grad_norm(),
            seed: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            loss_dir: default_loss_dir(),
        }
    }
}

impl RunSpec {
    /// Load and validate a run specification from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let spec: RunSpec = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.release.is_empty() {
            return Err(Error::Config("release name is empty".into()));
        }
        if self.training.epochs == 0 {
            return Err(Error::Config("epochs must be at least 1".into()));
        }
        if self.training.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.training.blend_k) {
            return Err(Error::Config(format!(
                "blend_k must lie in [0, 1], got {}",
                self.training.blend_k
            )));
        }
        if self.optimizer.lr <= 0.0 {
            return Err(Error::Config(format!(
                "learning rate must be positive, got {}",
                self.optimizer.lr
            )));
        }
        if self.model.embed_dim == 0 || self.model.hidden_dim == 0 {
            return Err(Error::Config("model dimensions must be positive".into()));
        }
        if self.data.token_budget == 0 || self.data.max_file_lines == 0 {
            return Err(Error::Config("data shaping values must be positive".into()));
        }
        if self.data.vocab_size < 2 {
            return Err(Error::Config("vocab_size must be at least 2".into()));
        }
        if let Some(norm) = self.training.max_grad_norm {
            if norm <= 0.0 {
                return Err(Error::Config(format!(
                    "max_grad_norm must be positive, got {norm}"
                )));
            }
        }
        Ok(())
    }
}
