//! Experiment configuration
//!
//! The defaults are the fixed hyperparameters of the experiment. Running the
//! binary without flags uses exactly these values.

use serde::{Deserialize, Serialize};

/// Model hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Output width of each first-layer attention head
    pub hidden_dim: usize,
    /// Number of first-layer attention heads (concatenated)
    pub num_heads: usize,
    /// Dropout rate for attention coefficients and the first layer's input
    pub dropout: f64,
    /// Dropout rate on the hidden activations after ELU
    pub hidden_dropout: f64,
    /// Negative slope of the LeakyReLU inside the attention score
    pub negative_slope: f64,
    /// ELU alpha after the first layer
    pub elu_alpha: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden_dim: 8,
            num_heads: 8,
            dropout: 0.6,
            hidden_dropout: 0.5,
            negative_slope: 0.2,
            elu_alpha: 1.0,
        }
    }
}

/// Training-loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Progress is reported when `epoch % log_every == 0`
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.01,
            log_every: 10,
        }
    }
}

/// Train/validation/test partition sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub train_per_class: usize,
    pub num_val: usize,
    pub num_test: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_per_class: 20,
            num_val: 500,
            num_test: 1000,
        }
    }
}

/// Local Outlier Factor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LofConfig {
    pub n_neighbors: usize,
    /// `None` uses the fixed `-1.5` offset on the negative outlier factor
    pub contamination: Option<f64>,
}

impl Default for LofConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 20,
            contamination: None,
        }
    }
}

/// Complete experiment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Seed for every random draw in the run
    pub seed: u64,
    /// Dataset cache directory
    pub data_root: String,
    /// Nodes whose features are replaced by Gaussian noise before training
    pub anomaly_indices: Vec<usize>,
    pub model: ModelConfig,
    pub train: TrainConfig,
    pub split: SplitConfig,
    pub lof: LofConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            data_root: "data/Cora".to_string(),
            anomaly_indices: vec![2, 5, 10],
            model: ModelConfig::default(),
            train: TrainConfig::default(),
            split: SplitConfig::default(),
            lof: LofConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Serialize to JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
