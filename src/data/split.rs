//! Train/validation/test partitioning
//!
//! Per-class training nodes, then fixed-size validation and test sets drawn
//! from the remaining nodes, after one seeded shuffle.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::SplitConfig;
use crate::error::{Error, Result};

/// Disjoint node-selection masks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitMasks {
    pub train: Vec<bool>,
    pub val: Vec<bool>,
    pub test: Vec<bool>,
}

/// Build the standard semi-supervised split
///
/// Classes with fewer than `train_per_class` nodes contribute all of them.
/// Validation and test take what is left if there are not enough nodes, but
/// an empty test partition is an error.
pub fn planetoid_split(
    labels: &[usize],
    num_classes: usize,
    config: &SplitConfig,
    rng: &mut StdRng,
) -> Result<SplitMasks> {
    let n = labels.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut train = vec![false; n];
    let mut per_class = vec![0usize; num_classes];
    for &i in &order {
        let y = labels[i];
        if y >= num_classes {
            return Err(Error::InvalidInput(format!(
                "label {} out of range for {} classes",
                y, num_classes
            )));
        }
        if per_class[y] < config.train_per_class {
            per_class[y] += 1;
            train[i] = true;
        }
    }

    let mut rest = order.into_iter().filter(|&i| !train[i]);

    let mut val = vec![false; n];
    for i in rest.by_ref().take(config.num_val) {
        val[i] = true;
    }

    let mut test = vec![false; n];
    let mut num_test = 0;
    for i in rest.take(config.num_test) {
        test[i] = true;
        num_test += 1;
    }

    if num_test == 0 {
        return Err(Error::InsufficientData(format!(
            "{} nodes leave no test nodes after {} train and {} validation",
            n,
            per_class.iter().sum::<usize>(),
            config.num_val
        )));
    }

    Ok(SplitMasks { train, val, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn labels(n: usize, classes: usize) -> Vec<usize> {
        (0..n).map(|i| i % classes).collect()
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let labels = labels(300, 3);
        let config = SplitConfig {
            train_per_class: 10,
            num_val: 50,
            num_test: 100,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let masks = planetoid_split(&labels, 3, &config, &mut rng).unwrap();

        let count = |m: &[bool]| m.iter().filter(|&&v| v).count();
        assert_eq!(count(&masks.train), 30);
        assert_eq!(count(&masks.val), 50);
        assert_eq!(count(&masks.test), 100);

        for i in 0..300 {
            let hits = [masks.train[i], masks.val[i], masks.test[i]].iter().filter(|&&v| v).count();
            assert!(hits <= 1);
        }

        for class in 0..3 {
            let in_train = (0..300).filter(|&i| masks.train[i] && labels[i] == class).count();
            assert_eq!(in_train, 10);
        }
    }

    #[test]
    fn test_split_is_seeded() {
        let labels = labels(100, 4);
        let config = SplitConfig {
            train_per_class: 5,
            num_val: 20,
            num_test: 30,
        };
        let a = planetoid_split(&labels, 4, &config, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = planetoid_split(&labels, 4, &config, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_test_nodes_is_error() {
        let labels = labels(10, 2);
        let config = SplitConfig {
            train_per_class: 5,
            num_val: 0,
            num_test: 10,
        };
        let result = planetoid_split(&labels, 2, &config, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }
}
