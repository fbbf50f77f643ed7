//! Anomaly detection
//!
//! This module provides:
//! - Local Outlier Factor over node embeddings
//! - Gaussian feature injection to manufacture outlier nodes

mod injector;
mod lof;

pub use injector::AnomalyInjector;
pub use lof::LocalOutlierFactor;

use ndarray::Array2;

use crate::error::Result;

/// Result of anomaly detection
#[derive(Debug, Clone)]
pub struct AnomalyResult {
    /// Binary flags indicating anomalies
    pub is_anomaly: Vec<bool>,
    /// Continuous anomaly scores (higher = more anomalous)
    pub scores: Vec<f64>,
}

impl AnomalyResult {
    /// Create a new anomaly result
    pub fn new(is_anomaly: Vec<bool>, scores: Vec<f64>) -> Self {
        Self { is_anomaly, scores }
    }

    /// Get the number of detected anomalies
    pub fn anomaly_count(&self) -> usize {
        self.is_anomaly.iter().filter(|&&x| x).count()
    }

    /// `-1` for anomalies, `+1` for inliers
    pub fn labels(&self) -> Vec<i8> {
        self.is_anomaly.iter().map(|&a| if a { -1 } else { 1 }).collect()
    }
}

/// Trait for multivariate outlier detectors
pub trait OutlierDetector {
    /// Fit the detector to data
    fn fit(&mut self, data: &Array2<f64>) -> Result<()>;

    /// Flags and scores of the rows seen by the last `fit`
    fn fitted_result(&self) -> Result<AnomalyResult>;

    /// Fit on `data` and label those same rows
    fn fit_predict(&mut self, data: &Array2<f64>) -> Result<AnomalyResult> {
        self.fit(data)?;
        self.fitted_result()
    }

    /// Get the name of the detector
    fn name(&self) -> &str;
}
