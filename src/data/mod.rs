//! Graph datasets
//!
//! A [`Dataset`] bundles node features, the citation graph, labels and the
//! train/validation/test partition masks.

pub mod cora;
pub mod split;
pub mod synthetic;

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::graph::SparseGraph;

pub use cora::CoraLoader;
pub use split::{planetoid_split, SplitMasks};
pub use synthetic::SyntheticConfig;

/// Node-classification dataset over a single graph
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Dataset name for logging
    pub name: String,
    /// Node feature matrix (nodes x features)
    pub features: Array2<f64>,
    /// Citation graph
    pub graph: SparseGraph,
    /// Class index of every node
    pub labels: Vec<usize>,
    /// Class names, indexed by label
    pub class_names: Vec<String>,
    pub train_mask: Vec<bool>,
    pub val_mask: Vec<bool>,
    pub test_mask: Vec<bool>,
}

impl Dataset {
    /// Get number of nodes
    pub fn num_nodes(&self) -> usize {
        self.features.nrows()
    }

    /// Get number of features per node
    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Get number of classes
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Node indices selected by a mask
    pub fn indices(mask: &[bool]) -> Vec<usize> {
        mask.iter()
            .enumerate()
            .filter_map(|(i, &m)| if m { Some(i) } else { None })
            .collect()
    }

    /// Check the structural invariants of the dataset
    pub fn validate(&self) -> Result<()> {
        let n = self.num_nodes();

        if self.graph.num_nodes() != n {
            return Err(Error::InvalidDataset(format!(
                "graph has {} nodes but features have {} rows",
                self.graph.num_nodes(),
                n
            )));
        }
        if self.labels.len() != n {
            return Err(Error::InvalidDataset(format!(
                "{} labels for {} nodes",
                self.labels.len(),
                n
            )));
        }
        if let Some(&bad) = self.labels.iter().find(|&&y| y >= self.num_classes()) {
            return Err(Error::InvalidDataset(format!(
                "label {} out of range for {} classes",
                bad,
                self.num_classes()
            )));
        }

        for (name, mask) in [
            ("train", &self.train_mask),
            ("val", &self.val_mask),
            ("test", &self.test_mask),
        ] {
            if mask.len() != n {
                return Err(Error::InvalidDataset(format!(
                    "{} mask has length {}, expected {}",
                    name,
                    mask.len(),
                    n
                )));
            }
        }

        let overlap = (0..n)
            .filter(|&i| {
                [self.train_mask[i], self.val_mask[i], self.test_mask[i]]
                    .iter()
                    .filter(|&&m| m)
                    .count()
                    > 1
            })
            .count();
        if overlap > 0 {
            return Err(Error::InvalidDataset(format!(
                "{} nodes belong to more than one partition",
                overlap
            )));
        }

        Ok(())
    }

    /// Short human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "{}: {} nodes, {} edges, {} features, {} classes, {}/{}/{} train/val/test",
            self.name,
            self.num_nodes(),
            self.graph.num_edges(),
            self.num_features(),
            self.num_classes(),
            Self::indices(&self.train_mask).len(),
            Self::indices(&self.val_mask).len(),
            Self::indices(&self.test_mask).len(),
        )
    }
}
