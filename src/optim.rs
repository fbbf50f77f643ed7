//! Optimization Algorithms
//!
//! Parameters are addressed by slot ids handed out by the model, so one
//! optimizer instance can keep separate moment estimates for every tensor.

use std::collections::HashMap;

use ndarray::{Array, Array1, Array2, Dimension, Ix1, Ix2};
use serde::{Deserialize, Serialize};

/// Optimizer trait for parameter updates
pub trait Optimizer {
    /// Start a new optimization step
    fn begin_step(&mut self);

    /// Update a weight matrix given its gradient
    fn update_matrix(&mut self, slot: usize, weights: &mut Array2<f64>, gradients: &Array2<f64>);

    /// Update a vector parameter given its gradient
    fn update_vector(&mut self, slot: usize, values: &mut Array1<f64>, gradients: &Array1<f64>);

    /// Reset optimizer state (for new training run)
    fn reset(&mut self);
}

/// First and second moment estimates of one parameter
#[derive(Clone)]
struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

/// Adam optimizer (Adaptive Moment Estimation)
#[derive(Clone, Serialize, Deserialize)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    #[serde(skip)]
    t: usize,
    #[serde(skip)]
    matrices: HashMap<usize, Moments<Ix2>>,
    #[serde(skip)]
    vectors: HashMap<usize, Moments<Ix1>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            matrices: HashMap::new(),
            vectors: HashMap::new(),
        }
    }

    /// Number of steps taken so far
    pub fn steps(&self) -> usize {
        self.t
    }

    fn apply<D: Dimension>(
        &self,
        moments: &mut Moments<D>,
        params: &mut Array<f64, D>,
        gradients: &Array<f64, D>,
    ) {
        // The step counter is advanced by begin_step; treat a missing call as step 1
        let t = self.t.max(1) as i32;

        // Update biased first moment estimate
        moments.m = &moments.m * self.beta1 + gradients * (1.0 - self.beta1);

        // Update biased second moment estimate
        moments.v = &moments.v * self.beta2 + &(gradients * gradients) * (1.0 - self.beta2);

        // Compute bias-corrected estimates
        let m_hat = &moments.m / (1.0 - self.beta1.powi(t));
        let v_hat = &moments.v / (1.0 - self.beta2.powi(t));

        *params -= &(&m_hat * self.learning_rate / &(v_hat.mapv(f64::sqrt) + self.epsilon));
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update_matrix(&mut self, slot: usize, weights: &mut Array2<f64>, gradients: &Array2<f64>) {
        let mut moments = self.matrices.remove(&slot).unwrap_or_else(|| Moments {
            m: Array2::zeros(weights.dim()),
            v: Array2::zeros(weights.dim()),
        });
        self.apply(&mut moments, weights, gradients);
        self.matrices.insert(slot, moments);
    }

    fn update_vector(&mut self, slot: usize, values: &mut Array1<f64>, gradients: &Array1<f64>) {
        let mut moments = self.vectors.remove(&slot).unwrap_or_else(|| Moments {
            m: Array1::zeros(values.len()),
            v: Array1::zeros(values.len()),
        });
        self.apply(&mut moments, values, gradients);
        self.vectors.insert(slot, moments);
    }

    fn reset(&mut self) {
        self.t = 0;
        self.matrices.clear();
        self.vectors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_adam_first_step_moves_by_learning_rate() {
        let mut optimizer = Adam::new(0.01);
        let mut weights = Array2::ones((3, 2));
        let gradients = Array2::from_elem((3, 2), 0.5);

        optimizer.begin_step();
        optimizer.update_matrix(0, &mut weights, &gradients);

        // Bias correction makes the first step exactly lr * sign(g)
        assert_abs_diff_eq!(weights[[0, 0]], 0.99, epsilon = 1e-6);
    }

    #[test]
    fn test_adam_update() {
        let mut optimizer = Adam::new(0.001);
        let mut weights = Array2::ones((3, 2));
        let gradients = Array2::ones((3, 2));

        // Multiple updates
        for _ in 0..10 {
            optimizer.begin_step();
            optimizer.update_matrix(0, &mut weights, &gradients);
        }

        // Weights should have decreased
        assert!(weights[[0, 0]] < 1.0);
        assert_eq!(optimizer.steps(), 10);
    }

    #[test]
    fn test_slots_keep_separate_state() {
        let mut optimizer = Adam::new(0.1);
        let mut a = Array1::zeros(2);
        let mut b = Array1::zeros(2);

        optimizer.begin_step();
        optimizer.update_vector(0, &mut a, &Array1::from_vec(vec![1.0, 1.0]));
        optimizer.update_vector(1, &mut b, &Array1::from_vec(vec![-1.0, -1.0]));

        assert!(a[0] < 0.0);
        assert!(b[0] > 0.0);

        optimizer.reset();
        assert_eq!(optimizer.steps(), 0);
    }

    #[test]
    fn test_adam_minimizes_quadratic() {
        let mut optimizer = Adam::new(0.05);
        let mut x = Array1::from_vec(vec![3.0, -2.0]);

        for _ in 0..500 {
            let grad = &x * 2.0;
            optimizer.begin_step();
            optimizer.update_vector(0, &mut x, &grad);
        }

        assert!(x.iter().all(|v| v.abs() < 5e-2));
    }
}
