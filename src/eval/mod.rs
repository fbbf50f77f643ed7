//! Post-training evaluation
//!
//! Scores the trained model on the test partition and runs LOF over the
//! final-layer embeddings of every node.

pub mod metrics;

use ndarray::Axis;
use tracing::{debug, info};

use crate::anomaly::{LocalOutlierFactor, OutlierDetector};
use crate::config::LofConfig;
use crate::data::Dataset;
use crate::error::Result;
use crate::gat::GraphAttentionNetwork;

/// Outcome of one evaluation run
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Mean NLL over test nodes
    pub test_loss: f64,
    /// Fraction of test nodes classified correctly
    pub test_accuracy: f64,
    /// One-vs-rest macro ROC AUC on test nodes
    pub test_auc: f64,
    /// LOF label per node: -1 outlier, +1 inlier
    pub anomaly_labels: Vec<i8>,
    /// LOF score per node, more negative is more anomalous
    pub negative_outlier_factor: Vec<f64>,
}

impl Evaluation {
    /// Which of `indices` LOF labelled as outliers
    pub fn flagged_anomalies(&self, indices: &[usize]) -> Vec<usize> {
        indices
            .iter()
            .cloned()
            .filter(|&i| self.anomaly_labels.get(i) == Some(&-1))
            .collect()
    }

    /// Summary line printed at the end of a run
    pub fn summary_line(&self) -> String {
        format!(
            "Test Loss {:.4}, Test Accuracy {:.4}, Test AUC {:.4}",
            self.test_loss, self.test_accuracy, self.test_auc
        )
    }

    /// LOF labels in bracketed list form
    pub fn anomaly_line(&self) -> String {
        format!("Anomaly Scores: {:?}", self.anomaly_labels)
    }
}

/// Evaluates a trained model
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    lof: LofConfig,
}

impl Evaluator {
    /// Create an evaluator with the given LOF settings
    pub fn new(lof: LofConfig) -> Self {
        Self { lof }
    }

    /// Run inference without gradients and compute every metric
    pub fn evaluate(&self, model: &GraphAttentionNetwork, dataset: &Dataset) -> Result<Evaluation> {
        let log_probs = model.predict(&dataset.features, &dataset.graph)?;

        let test_loss = GraphAttentionNetwork::nll_loss(&log_probs, &dataset.labels, &dataset.test_mask)?;

        let test_idx = Dataset::indices(&dataset.test_mask);
        let predictions = metrics::argmax_rows(&log_probs);
        let test_pred: Vec<usize> = test_idx.iter().map(|&i| predictions[i]).collect();
        let test_labels: Vec<usize> = test_idx.iter().map(|&i| dataset.labels[i]).collect();
        let test_accuracy = metrics::accuracy(&test_pred, &test_labels)?;

        let probabilities = GraphAttentionNetwork::probabilities(&log_probs).select(Axis(0), &test_idx);
        let test_auc = metrics::roc_auc_ovr(&probabilities, &test_labels)?;

        debug!(
            test_loss,
            test_accuracy,
            test_auc,
            "Scored {} test nodes",
            test_idx.len()
        );

        let mut lof = LocalOutlierFactor::from_config(&self.lof)?;
        let outliers = lof.fit_predict(&log_probs)?;
        debug!(
            neighbors = ?lof.effective_neighbors(),
            offset = ?lof.offset(),
            "Ran {} on {} embeddings",
            lof.name(),
            log_probs.nrows()
        );
        let negative_outlier_factor = lof.negative_outlier_factor().map(<[f64]>::to_vec).unwrap_or_default();
        let anomaly_labels = outliers.labels();

        let evaluation = Evaluation {
            test_loss,
            test_accuracy,
            test_auc,
            anomaly_labels,
            negative_outlier_factor,
        };

        info!(
            "{} flagged {} of {} nodes as outliers",
            lof.name(),
            outliers.anomaly_count(),
            dataset.num_nodes()
        );
        Ok(evaluation)
    }
}
