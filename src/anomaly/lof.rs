//! Local Outlier Factor
//!
//! Density-based outlier detection. A point whose local reachability density
//! is much lower than that of its k nearest neighbours gets a large LOF.
//!
//! Algorithm:
//! 1. k-distance(o) = distance from o to its k-th nearest neighbour
//! 2. reach(p, o) = max(k-distance(o), d(p, o))
//! 3. lrd(p) = 1 / (mean reach(p, o) over the neighbours of p)
//! 4. LOF(p) = mean lrd(o) / lrd(p)
//!
//! Scores are reported as the negative outlier factor, so inliers sit near -1
//! and outliers are more negative.

use ndarray::{Array2, ArrayView1};
use ordered_float::OrderedFloat;
use tracing::{debug, warn};

use super::{AnomalyResult, OutlierDetector};
use crate::config::LofConfig;
use crate::error::{Error, Result};

/// Offset on the negative outlier factor when no contamination is given
pub const DEFAULT_OFFSET: f64 = -1.5;

/// Guards the density against zero reachability (duplicate points)
const EPSILON: f64 = 1e-10;

/// State computed by [`LocalOutlierFactor::fit`]
#[derive(Debug, Clone)]
struct Fitted {
    k: usize,
    negative_outlier_factor: Vec<f64>,
    offset: f64,
}

/// Local Outlier Factor detector
#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    n_neighbors: usize,
    contamination: Option<f64>,
    fitted: Option<Fitted>,
}

impl Default for LocalOutlierFactor {
    fn default() -> Self {
        Self::new(20)
    }
}

impl LocalOutlierFactor {
    /// Create a detector using `n_neighbors` neighbours
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            contamination: None,
            fitted: None,
        }
    }

    /// Set the expected fraction of outliers, in (0, 0.5]
    pub fn with_contamination(mut self, contamination: f64) -> Result<Self> {
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(Error::InvalidInput(format!(
                "contamination must be in (0, 0.5], got {}",
                contamination
            )));
        }
        self.contamination = Some(contamination);
        Ok(self)
    }

    /// Build from configuration
    pub fn from_config(config: &LofConfig) -> Result<Self> {
        let lof = Self::new(config.n_neighbors);
        match config.contamination {
            Some(c) => lof.with_contamination(c),
            None => Ok(lof),
        }
    }

    /// Negative LOF of each training row
    pub fn negative_outlier_factor(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.negative_outlier_factor.as_slice())
    }

    /// Decision threshold on the negative outlier factor
    pub fn offset(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.offset)
    }

    /// Neighbour count actually used after clamping to `n - 1`
    pub fn effective_neighbors(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.k)
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("LocalOutlierFactor used before fit".into()))
    }
}

impl OutlierDetector for LocalOutlierFactor {
    fn fit(&mut self, data: &Array2<f64>) -> Result<()> {
        let n = data.nrows();
        if n < 2 {
            return Err(Error::InsufficientData(format!(
                "LOF needs at least 2 samples, got {}",
                n
            )));
        }
        if self.n_neighbors == 0 {
            return Err(Error::InvalidInput("n_neighbors must be positive".into()));
        }

        let k = self.n_neighbors.min(n - 1);
        if k < self.n_neighbors {
            warn!(
                "n_neighbors ({}) is not below the number of samples ({}); using {}",
                self.n_neighbors, n, k
            );
        }

        let neighbors: Vec<Vec<(usize, f64)>> = (0..n)
            .map(|i| nearest(data, data.row(i), k, i))
            .collect();

        let k_distance: Vec<f64> = neighbors.iter().map(|nn| nn[k - 1].1).collect();

        let lrd: Vec<f64> = neighbors
            .iter()
            .map(|nn| local_reachability_density(nn, &k_distance))
            .collect();

        let negative_outlier_factor: Vec<f64> = neighbors
            .iter()
            .zip(&lrd)
            .map(|(nn, &own)| -outlier_factor(nn, &lrd, own))
            .collect();

        let offset = match self.contamination {
            Some(c) => percentile(&negative_outlier_factor, 100.0 * c),
            None => DEFAULT_OFFSET,
        };

        debug!(n, k, offset, "Fitted local outlier factor");

        self.fitted = Some(Fitted {
            k,
            negative_outlier_factor,
            offset,
        });
        Ok(())
    }

    fn fitted_result(&self) -> Result<AnomalyResult> {
        let fitted = self.fitted()?;
        let is_anomaly = fitted
            .negative_outlier_factor
            .iter()
            .map(|&s| s < fitted.offset)
            .collect();
        let scores = fitted.negative_outlier_factor.iter().map(|&s| -s).collect();
        Ok(AnomalyResult::new(is_anomaly, scores))
    }

    fn name(&self) -> &str {
        "Local Outlier Factor"
    }
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// The `k` rows of `data` closest to `query`, nearest first, skipping row `exclude`
fn nearest(data: &Array2<f64>, query: ArrayView1<f64>, k: usize, exclude: usize) -> Vec<(usize, f64)> {
    let mut dists: Vec<(usize, f64)> = data
        .rows()
        .into_iter()
        .enumerate()
        .filter(|&(j, _)| j != exclude)
        .map(|(j, row)| (j, euclidean(query, row)))
        .collect();

    dists.sort_by_key(|&(j, d)| (OrderedFloat(d), j));
    dists.truncate(k);
    dists
}

fn local_reachability_density(neighbors: &[(usize, f64)], k_distance: &[f64]) -> f64 {
    let mean_reach = neighbors
        .iter()
        .map(|&(o, d)| k_distance[o].max(d))
        .sum::<f64>()
        / neighbors.len() as f64;
    1.0 / (mean_reach + EPSILON)
}

fn outlier_factor(neighbors: &[(usize, f64)], lrd: &[f64], own: f64) -> f64 {
    let mean = neighbors.iter().map(|&(o, _)| lrd[o]).sum::<f64>() / neighbors.len() as f64;
    mean / own
}

/// Linear-interpolation percentile, `q` in [0, 100]
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by_key(|&v| OrderedFloat(v));

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// 5x5 unit grid plus one far-away point at index 25
    fn grid_with_outlier() -> Array2<f64> {
        let mut data = Array2::zeros((26, 2));
        for i in 0..25 {
            data[[i, 0]] = (i % 5) as f64;
            data[[i, 1]] = (i / 5) as f64;
        }
        data[[25, 0]] = 100.0;
        data[[25, 1]] = 100.0;
        data
    }

    #[test]
    fn test_far_point_is_flagged() {
        let data = grid_with_outlier();
        let mut lof = LocalOutlierFactor::default();
        let labels = lof.fit_predict(&data).unwrap().labels();

        assert_eq!(labels[25], -1);
        assert!(labels[..25].iter().all(|&l| l == 1));
        assert_eq!(lof.effective_neighbors(), Some(20));
        assert_eq!(lof.offset(), Some(DEFAULT_OFFSET));
    }

    #[test]
    fn test_cluster_scores_near_minus_one() {
        let data = grid_with_outlier();
        let mut lof = LocalOutlierFactor::new(10);
        lof.fit(&data).unwrap();

        let scores = lof.negative_outlier_factor().unwrap();
        for &s in &scores[..25] {
            assert!(s < -0.5 && s > -1.5, "inlier score {}", s);
        }
        assert!(scores[25] < -10.0);
    }

    #[test]
    fn test_duplicates_are_finite() {
        let data = Array2::from_elem((5, 3), 1.0);
        let mut lof = LocalOutlierFactor::new(2);
        let labels = lof.fit_predict(&data).unwrap().labels();

        for &s in lof.negative_outlier_factor().unwrap() {
            assert!(s.is_finite());
            assert_abs_diff_eq!(s, -1.0, epsilon = 1e-9);
        }
        assert!(labels.iter().all(|&l| l == 1));
    }

    #[test]
    fn test_neighbors_clamped_to_sample_count() {
        let data = array![[0.0], [1.0], [2.0]];
        let mut lof = LocalOutlierFactor::new(20);
        lof.fit(&data).unwrap();
        assert_eq!(lof.effective_neighbors(), Some(2));
    }

    #[test]
    fn test_too_few_samples() {
        let data = array![[0.0, 1.0]];
        let mut lof = LocalOutlierFactor::default();
        assert!(matches!(lof.fit(&data), Err(Error::InsufficientData(_))));
    }

    #[test]
    fn test_contamination_sets_offset() {
        let data = grid_with_outlier();
        let mut lof = LocalOutlierFactor::new(10).with_contamination(0.05).unwrap();
        let labels = lof.fit_predict(&data).unwrap().labels();

        assert_ne!(lof.offset(), Some(DEFAULT_OFFSET));
        assert_eq!(labels[25], -1);
        let flagged = labels.iter().filter(|&&l| l == -1).count();
        assert!(flagged >= 1 && flagged <= 2);
    }

    #[test]
    fn test_invalid_contamination() {
        assert!(LocalOutlierFactor::new(5).with_contamination(0.0).is_err());
        assert!(LocalOutlierFactor::new(5).with_contamination(0.7).is_err());
    }

    #[test]
    fn test_fitted_result_scores() {
        let data = grid_with_outlier();
        let mut lof = LocalOutlierFactor::new(10);
        let result = lof.fit_predict(&data).unwrap();

        assert_eq!(result.anomaly_count(), 1);
        assert!(result.is_anomaly[25]);
        let nof = lof.negative_outlier_factor().unwrap();
        for (score, &s) in result.scores.iter().zip(nof) {
            assert_abs_diff_eq!(*score, -s);
        }
        assert_eq!(lof.name(), "Local Outlier Factor");
    }

    #[test]
    fn test_result_requires_fit() {
        let lof = LocalOutlierFactor::default();
        assert!(lof.fitted_result().is_err());
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_abs_diff_eq!(percentile(&values, 0.0), 1.0);
        assert_abs_diff_eq!(percentile(&values, 50.0), 2.5);
        assert_abs_diff_eq!(percentile(&values, 100.0), 4.0);
    }
}
