//! Synthetic citation-like graphs
//!
//! Planted-partition graph whose nodes carry sparse binary "word" features.
//! Each class owns a block of words that its members use often; every other
//! word appears rarely. Useful for exercising the full pipeline offline.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::split::planetoid_split;
use super::Dataset;
use crate::config::SplitConfig;
use crate::error::{Error, Result};
use crate::graph::SparseGraph;

/// Generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub num_nodes: usize,
    pub num_features: usize,
    pub num_classes: usize,
    /// Edge probability between nodes of the same class
    pub p_in: f64,
    /// Edge probability between nodes of different classes
    pub p_out: f64,
    /// Probability that a node uses one of its class words
    pub p_word: f64,
    /// Probability that a node uses any other word
    pub p_noise: f64,
    pub split: SplitConfig,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_nodes: 200,
            num_features: 60,
            num_classes: 4,
            p_in: 0.08,
            p_out: 0.005,
            p_word: 0.3,
            p_noise: 0.03,
            split: SplitConfig {
                train_per_class: 10,
                num_val: 40,
                num_test: 80,
            },
        }
    }
}

/// Generate a dataset
pub fn generate(config: &SyntheticConfig, rng: &mut StdRng) -> Result<Dataset> {
    let SyntheticConfig {
        num_nodes: n,
        num_features: f,
        num_classes: c,
        ..
    } = *config;

    if c < 2 || f < c || n < c {
        return Err(Error::InvalidInput(format!(
            "synthetic graph needs >= 2 classes, at least one word and one node per class (nodes {}, features {}, classes {})",
            n, f, c
        )));
    }

    let labels: Vec<usize> = (0..n).map(|i| i % c).collect();
    let block = f / c;

    let features = Array2::from_shape_fn((n, f), |(i, k)| {
        let own = k / block == labels[i] && k < block * c;
        let p = if own { config.p_word } else { config.p_noise };
        if rng.gen::<f64>() < p {
            1.0
        } else {
            0.0
        }
    });

    let mut edges = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let p = if labels[i] == labels[j] {
                config.p_in
            } else {
                config.p_out
            };
            if rng.gen::<f64>() < p {
                edges.push((i, j));
            }
        }
    }

    let graph = SparseGraph::from_edge_index(n, &edges)?.make_symmetric();
    let masks = planetoid_split(&labels, c, &config.split, rng)?;

    let dataset = Dataset {
        name: "Synthetic".to_string(),
        features,
        graph,
        labels,
        class_names: (0..c).map(|k| format!("class_{}", k)).collect(),
        train_mask: masks.train,
        val_mask: masks.val,
        test_mask: masks.test,
    };
    dataset.validate()?;
    Ok(dataset)
}
