//! Synthetic anomaly injection
//!
//! Overwrites selected node feature rows with standard-normal noise. The
//! original rows are not kept.

use ndarray::{Array1, Array2};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use tracing::info;

use crate::data::Dataset;
use crate::error::{Error, Result};

/// Replaces a fixed set of feature rows with Gaussian noise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyInjector {
    indices: Vec<usize>,
}

impl AnomalyInjector {
    /// Create an injector for the given node indices
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self {
            indices: indices.into(),
        }
    }

    /// Nodes that get overwritten
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Inject into a dataset's feature matrix
    pub fn inject(&self, dataset: &mut Dataset, rng: &mut StdRng) -> Result<()> {
        self.inject_features(&mut dataset.features, rng)?;
        info!(
            "Injected Gaussian noise into {} nodes of {}: {:?}",
            self.indices.len(),
            dataset.name,
            self.indices
        );
        Ok(())
    }

    /// Overwrite the indexed rows of `features`
    ///
    /// All indices are checked before any row is modified.
    pub fn inject_features(&self, features: &mut Array2<f64>, rng: &mut StdRng) -> Result<()> {
        let n = features.nrows();
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= n) {
            return Err(Error::InvalidInput(format!(
                "anomaly index {} out of range for {} nodes",
                bad, n
            )));
        }

        let width = features.ncols();
        for &i in &self.indices {
            let noise = Array1::<f64>::random_using(width, StandardNormal, rng);
            features.row_mut(i).assign(&noise);
        }
        Ok(())
    }
}
