//! Classification metrics
//!
//! Accuracy, binary ROC AUC and the one-vs-rest macro average for
//! multi-class probability scores.

use std::collections::BTreeSet;

use ndarray::{Array2, ArrayView1, Axis};
use ordered_float::OrderedFloat;

use crate::error::{Error, Result};

/// Index of the largest entry of each row
pub fn argmax_rows(scores: &Array2<f64>) -> Vec<usize> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .max_by_key(|&(_, &v)| OrderedFloat(v))
                .map(|(k, _)| k)
                .unwrap_or(0)
        })
        .collect()
}

/// Fraction of predictions equal to the labels
pub fn accuracy(predictions: &[usize], labels: &[usize]) -> Result<f64> {
    if predictions.len() != labels.len() {
        return Err(Error::Metric(format!(
            "{} predictions for {} labels",
            predictions.len(),
            labels.len()
        )));
    }
    if labels.is_empty() {
        return Err(Error::Metric("accuracy of an empty set".into()));
    }

    let correct = predictions.iter().zip(labels).filter(|(p, y)| p == y).count();
    Ok(correct as f64 / labels.len() as f64)
}

/// Area under the ROC curve for one positive class
///
/// Trapezoid rule over thresholds, with tied scores grouped into one step.
/// Needs at least one positive and one negative.
pub fn binary_roc_auc(scores: ArrayView1<f64>, positive: &[bool]) -> Result<f64> {
    if scores.len() != positive.len() {
        return Err(Error::Metric(format!(
            "{} scores for {} targets",
            scores.len(),
            positive.len()
        )));
    }

    check_finite(scores.iter())?;

    let mut pairs: Vec<(f64, bool)> = scores.iter().cloned().zip(positive.iter().cloned()).collect();

    // Sort by score descending
    pairs.sort_by_key(|&(s, _)| std::cmp::Reverse(OrderedFloat(s)));

    let n_pos = pairs.iter().filter(|(_, t)| *t).count() as f64;
    let n_neg = pairs.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return Err(Error::Metric(
            "ROC AUC needs both positive and negative samples".into(),
        ));
    }

    let n = pairs.len();
    let mut tpr_prev = 0.0;
    let mut fpr_prev = 0.0;
    let mut auc = 0.0;
    let mut tp = 0.0;
    let mut fp = 0.0;

    let mut i = 0;
    while i < n {
        let score = pairs[i].0;
        let mut j = i;
        while j < n && (pairs[j].0 - score).abs() < 1e-12 {
            if pairs[j].1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            j += 1;
        }

        let tpr = tp / n_pos;
        let fpr = fp / n_neg;
        auc += (fpr - fpr_prev) * (tpr + tpr_prev) / 2.0;

        tpr_prev = tpr;
        fpr_prev = fpr;
        i = j;
    }

    Ok(auc)
}

fn check_finite<'a>(mut scores: impl Iterator<Item = &'a f64>) -> Result<()> {
    if scores.any(|s| !s.is_finite()) {
        return Err(Error::Metric("scores contain NaN or infinite values".into()));
    }
    Ok(())
}

/// Macro-averaged one-vs-rest ROC AUC
///
/// `probabilities` has one row per sample and one column per class. Every
/// class must occur in `labels`: a class absent from the labels, or fewer
/// than two classes overall, is an error rather than a silently skipped term.
pub fn roc_auc_ovr(probabilities: &Array2<f64>, labels: &[usize]) -> Result<f64> {
    if probabilities.nrows() != labels.len() {
        return Err(Error::Metric(format!(
            "{} score rows for {} labels",
            probabilities.nrows(),
            labels.len()
        )));
    }

    check_finite(probabilities.iter())?;

    let classes: BTreeSet<usize> = labels.iter().cloned().collect();
    if classes.len() < 2 {
        return Err(Error::Metric(format!(
            "ROC AUC needs at least 2 classes in the labels, found {}",
            classes.len()
        )));
    }
    if classes.len() != probabilities.ncols() {
        return Err(Error::Metric(format!(
            "number of classes in labels ({}) does not match number of score columns ({})",
            classes.len(),
            probabilities.ncols()
        )));
    }
    if let Some(&bad) = classes.iter().find(|&&c| c >= probabilities.ncols()) {
        return Err(Error::Metric(format!(
            "label {} has no score column",
            bad
        )));
    }

    let mut total = 0.0;
    for class in 0..probabilities.ncols() {
        let positive: Vec<bool> = labels.iter().map(|&y| y == class).collect();
        total += binary_roc_auc(probabilities.column(class), &positive)?;
    }
    Ok(total / probabilities.ncols() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    #[test]
    fn test_accuracy() {
        assert_abs_diff_eq!(accuracy(&[0, 1, 2, 1], &[0, 1, 1, 1]).unwrap(), 0.75);
        assert!(accuracy(&[0], &[0, 1]).is_err());
        assert!(accuracy(&[], &[]).is_err());
    }

    #[test]
    fn test_argmax_rows() {
        let scores = array![[0.1, 0.7, 0.2], [0.5, 0.4, 0.1]];
        assert_eq!(argmax_rows(&scores), vec![1, 0]);
    }

    #[test]
    fn test_binary_auc_perfect_and_inverted() {
        let scores = Array1::from_vec(vec![0.1, 0.2, 0.8, 0.9]);
        let positive = [false, false, true, true];
        assert_abs_diff_eq!(binary_roc_auc(scores.view(), &positive).unwrap(), 1.0);

        let inverted = [true, true, false, false];
        assert_abs_diff_eq!(binary_roc_auc(scores.view(), &inverted).unwrap(), 0.0);
    }

    #[test]
    fn test_binary_auc_ties_count_half() {
        let scores = Array1::from_vec(vec![0.5, 0.5]);
        let positive = [true, false];
        assert_abs_diff_eq!(binary_roc_auc(scores.view(), &positive).unwrap(), 0.5);
    }

    #[test]
    fn test_binary_auc_single_class_is_error() {
        let scores = Array1::from_vec(vec![0.3, 0.6]);
        assert!(binary_roc_auc(scores.view(), &[true, true]).is_err());
    }

    #[test]
    fn test_binary_auc_rejects_nan_scores() {
        let scores = Array1::from_vec(vec![f64::NAN, 0.2, f64::NAN, 0.7]);
        let result = binary_roc_auc(scores.view(), &[true, false, false, true]);
        assert!(matches!(result, Err(Error::Metric(_))));
    }

    #[test]
    fn test_ovr_rejects_non_finite_scores() {
        let probs = array![[f64::NAN, 0.5], [0.3, 0.7], [0.6, f64::INFINITY]];
        assert!(matches!(roc_auc_ovr(&probs, &[0, 1, 0]), Err(Error::Metric(_))));
    }

    #[test]
    fn test_ovr_perfect_separation() {
        let probs = array![
            [0.8, 0.1, 0.1],
            [0.1, 0.8, 0.1],
            [0.1, 0.1, 0.8],
            [0.7, 0.2, 0.1],
        ];
        let labels = [0, 1, 2, 0];
        assert_abs_diff_eq!(roc_auc_ovr(&probs, &labels).unwrap(), 1.0);
    }

    #[test]
    fn test_ovr_in_unit_interval() {
        let probs = array![
            [0.4, 0.3, 0.3],
            [0.2, 0.5, 0.3],
            [0.3, 0.3, 0.4],
            [0.5, 0.1, 0.4],
            [0.1, 0.6, 0.3],
            [0.3, 0.4, 0.3],
        ];
        let labels = [1, 0, 2, 2, 1, 0];
        let auc = roc_auc_ovr(&probs, &labels).unwrap();
        assert!((0.0..=1.0).contains(&auc));
    }

    #[test]
    fn test_ovr_absent_class_is_error() {
        let probs = array![[0.6, 0.3, 0.1], [0.2, 0.7, 0.1], [0.5, 0.4, 0.1]];
        let labels = [0, 1, 0];
        assert!(matches!(roc_auc_ovr(&probs, &labels), Err(Error::Metric(_))));
    }

    #[test]
    fn test_ovr_single_class_is_error() {
        let probs = array![[0.6, 0.4], [0.7, 0.3]];
        assert!(matches!(roc_auc_ovr(&probs, &[0, 0]), Err(Error::Metric(_))));
    }

    #[test]
    fn test_ovr_length_mismatch() {
        let probs = array![[0.6, 0.4], [0.3, 0.7]];
        assert!(roc_auc_ovr(&probs, &[0, 1, 1]).is_err());
    }
}
