//! Graph Attention Layer implementation
//!
//! Single layer of Graph Attention Network.

use ndarray::{s, Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::attention::{AttentionCache, AttentionHead};
use crate::optim::Optimizer;

/// Activations saved by a training-mode forward pass
#[derive(Debug, Clone)]
pub struct LayerCache {
    /// Layer input as seen by the weights
    input: Array2<f64>,
    /// Transformed features per head
    z: Vec<Array2<f64>>,
    /// Attention coefficients per head
    attention: Vec<AttentionCache>,
}

/// Accumulated parameter gradients of one layer
#[derive(Debug, Clone)]
pub struct LayerGradients {
    pub weights: Vec<Array2<f64>>,
    pub att_src: Vec<Array1<f64>>,
    pub att_dst: Vec<Array1<f64>>,
    pub bias: Array1<f64>,
}

/// Graph Attention Layer
///
/// Applies multi-head attention to aggregate neighbor information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphAttentionLayer {
    /// Input dimension
    in_features: usize,
    /// Output dimension (per head)
    out_features: usize,
    /// Number of attention heads
    num_heads: usize,
    /// Weight matrices for each head
    pub(crate) weights: Vec<Array2<f64>>,
    /// Attention heads
    pub(crate) heads: Vec<AttentionHead>,
    /// Bias terms
    pub(crate) bias: Array1<f64>,
    /// Whether to concatenate heads (False for last layer)
    concat: bool,
    /// Gradient buffers, allocated by the first backward pass
    #[serde(skip)]
    grads: Option<LayerGradients>,
}

impl GraphAttentionLayer {
    /// Create a new Graph Attention Layer
    pub fn new(
        in_features: usize,
        out_features: usize,
        num_heads: usize,
        concat: bool,
        dropout: f64,
        negative_slope: f64,
        rng: &mut StdRng,
    ) -> Self {
        // Glorot initialization over the stacked (in, heads * out) weight
        let limit = (6.0 / (in_features + out_features * num_heads) as f64).sqrt();

        let weights: Vec<Array2<f64>> = (0..num_heads)
            .map(|_| Array2::random_using((in_features, out_features), Uniform::new(-limit, limit), rng))
            .collect();

        let heads = (0..num_heads)
            .map(|_| AttentionHead::new(out_features, num_heads, negative_slope, dropout, rng))
            .collect();

        let output_dim = if concat {
            out_features * num_heads
        } else {
            out_features
        };

        Self {
            in_features,
            out_features,
            num_heads,
            weights,
            heads,
            bias: Array1::zeros(output_dim),
            concat,
            grads: None,
        }
    }

    /// Forward pass
    ///
    /// `hoods` are the attention neighbourhoods (self included). An RNG turns
    /// on attention dropout.
    pub fn forward(
        &self,
        x: &Array2<f64>,
        hoods: &[Vec<usize>],
        mut rng: Option<&mut StdRng>,
    ) -> (Array2<f64>, LayerCache) {
        let n = x.nrows();
        let mut z_heads = Vec::with_capacity(self.num_heads);
        let mut attention = Vec::with_capacity(self.num_heads);
        let mut output = Array2::zeros((n, self.output_dim()));

        for (head_idx, (w, head)) in self.weights.iter().zip(&self.heads).enumerate() {
            let z = x.dot(w);
            let (head_out, cache) = head.forward(&z, hoods, rng.as_deref_mut());

            if self.concat {
                let start = head_idx * self.out_features;
                output
                    .slice_mut(s![.., start..start + self.out_features])
                    .assign(&head_out);
            } else {
                output.scaled_add(1.0 / self.num_heads as f64, &head_out);
            }

            z_heads.push(z);
            attention.push(cache);
        }

        output += &self.bias;

        let cache = LayerCache {
            input: x.clone(),
            z: z_heads,
            attention,
        };
        (output, cache)
    }

    /// Backward pass
    ///
    /// Adds this layer's parameter gradients to its buffers and, when
    /// `input_grad` is set, returns the gradient with respect to the input.
    pub fn backward(
        &mut self,
        hoods: &[Vec<usize>],
        cache: &LayerCache,
        d_out: &Array2<f64>,
        input_grad: bool,
    ) -> Option<Array2<f64>> {
        let mut d_input = input_grad.then(|| Array2::zeros(cache.input.dim()));

        let mut d_weights = Vec::with_capacity(self.num_heads);
        let mut d_att_src = Vec::with_capacity(self.num_heads);
        let mut d_att_dst = Vec::with_capacity(self.num_heads);

        for h in 0..self.num_heads {
            let d_head = if self.concat {
                let start = h * self.out_features;
                d_out.slice(s![.., start..start + self.out_features]).to_owned()
            } else {
                d_out / self.num_heads as f64
            };

            let grads = self.heads[h].backward(&cache.z[h], hoods, &cache.attention[h], d_head.view());

            d_weights.push(cache.input.t().dot(&grads.d_z));
            if let Some(d_input) = d_input.as_mut() {
                *d_input += &grads.d_z.dot(&self.weights[h].t());
            }
            d_att_src.push(grads.d_att_src);
            d_att_dst.push(grads.d_att_dst);
        }

        let d_bias = d_out.sum_axis(Axis(0));

        match self.grads.as_mut() {
            Some(acc) => {
                for h in 0..self.num_heads {
                    acc.weights[h] += &d_weights[h];
                    acc.att_src[h] += &d_att_src[h];
                    acc.att_dst[h] += &d_att_dst[h];
                }
                acc.bias += &d_bias;
            }
            None => {
                self.grads = Some(LayerGradients {
                    weights: d_weights,
                    att_src: d_att_src,
                    att_dst: d_att_dst,
                    bias: d_bias,
                });
            }
        }

        d_input
    }

    /// Drop accumulated gradients
    pub fn zero_grad(&mut self) {
        self.grads = None;
    }

    /// Accumulated gradients, if any backward pass ran since the last reset
    pub fn gradients(&self) -> Option<&LayerGradients> {
        self.grads.as_ref()
    }

    /// Apply accumulated gradients through the optimizer
    ///
    /// Parameters are addressed by consecutive slot ids starting at
    /// `first_slot`; the next free slot is returned.
    pub fn apply_gradients(&mut self, optimizer: &mut dyn Optimizer, first_slot: usize) -> usize {
        let mut slot = first_slot;
        let Some(grads) = self.grads.as_ref() else {
            return slot + self.num_slots();
        };

        for h in 0..self.num_heads {
            optimizer.update_matrix(slot, &mut self.weights[h], &grads.weights[h]);
            optimizer.update_vector(slot + 1, &mut self.heads[h].att_src, &grads.att_src[h]);
            optimizer.update_vector(slot + 2, &mut self.heads[h].att_dst, &grads.att_dst[h]);
            slot += 3;
        }
        optimizer.update_vector(slot, &mut self.bias, &grads.bias);
        slot + 1
    }

    /// Number of optimizer slots used by this layer
    fn num_slots(&self) -> usize {
        3 * self.num_heads + 1
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        let weight_params = self.in_features * self.out_features * self.num_heads;
        let attention_params = 2 * self.out_features * self.num_heads;

        weight_params + attention_params + self.bias.len()
    }

    /// Get output dimension
    pub fn output_dim(&self) -> usize {
        if self.concat {
            self.out_features * self.num_heads
        } else {
            self.out_features
        }
    }

    /// Get input dimension
    pub fn input_dim(&self) -> usize {
        self.in_features
    }

    /// Get number of heads
    pub fn num_heads(&self) -> usize {
        self.num_heads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SparseGraph;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    fn path_hoods(n: usize) -> Vec<Vec<usize>> {
        let edges: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        SparseGraph::from_edge_index(n, &edges)
            .unwrap()
            .make_symmetric()
            .neighborhoods_with_self()
    }

    #[test]
    fn test_layer_forward() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = GraphAttentionLayer::new(10, 8, 2, true, 0.0, 0.2, &mut rng);
        let x = Array2::random_using((5, 10), Uniform::new(-1.0, 1.0), &mut rng);

        let (output, _) = layer.forward(&x, &path_hoods(5), None);

        // Concatenated heads
        assert_eq!(output.dim(), (5, 16));
        assert_eq!(layer.output_dim(), 16);
    }

    #[test]
    fn test_layer_averaging() {
        let mut rng = StdRng::seed_from_u64(2);
        let layer = GraphAttentionLayer::new(10, 8, 2, false, 0.0, 0.2, &mut rng);
        let x = Array2::random_using((5, 10), Uniform::new(-1.0, 1.0), &mut rng);

        let (output, _) = layer.forward(&x, &path_hoods(5), None);

        assert_eq!(output.dim(), (5, 8));
    }

    #[test]
    fn test_num_parameters() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = GraphAttentionLayer::new(1433, 8, 8, true, 0.6, 0.2, &mut rng);

        assert_eq!(layer.num_parameters(), 1433 * 64 + 2 * 64 + 64);
    }

    #[test]
    fn test_gradients_accumulate_until_reset() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut layer = GraphAttentionLayer::new(4, 3, 2, true, 0.0, 0.2, &mut rng);
        let x = Array2::random_using((5, 4), Uniform::new(-1.0, 1.0), &mut rng);
        let hoods = path_hoods(5);

        let (out, cache) = layer.forward(&x, &hoods, None);
        let d_out = Array2::ones(out.dim());

        layer.backward(&hoods, &cache, &d_out, false);
        let once = layer.gradients().unwrap().bias.clone();
        layer.backward(&hoods, &cache, &d_out, false);
        let twice = layer.gradients().unwrap().bias.clone();

        for (a, b) in once.iter().zip(twice.iter()) {
            assert_abs_diff_eq!(2.0 * a, *b, epsilon = 1e-12);
        }

        layer.zero_grad();
        assert!(layer.gradients().is_none());
    }

    #[test]
    fn test_weight_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut layer = GraphAttentionLayer::new(3, 2, 2, false, 0.0, 0.2, &mut rng);
        let x = Array2::random_using((4, 3), Uniform::new(-1.0, 1.0), &mut rng);
        let hoods = path_hoods(4);
        let weights_out = Array2::random_using((4, 2), Uniform::new(-1.0, 1.0), &mut rng);

        let objective = |layer: &GraphAttentionLayer| (&layer.forward(&x, &hoods, None).0 * &weights_out).sum();

        let (_, cache) = layer.forward(&x, &hoods, None);
        let d_x = layer.backward(&hoods, &cache, &weights_out, true).unwrap();
        let grads = layer.gradients().unwrap().clone();

        let eps = 1e-6;
        for (h, idx) in [(0, (0, 0)), (1, (2, 1))] {
            let mut plus = layer.clone();
            plus.weights[h][idx] += eps;
            let mut minus = layer.clone();
            minus.weights[h][idx] -= eps;
            let numeric = (objective(&plus) - objective(&minus)) / (2.0 * eps);
            assert_abs_diff_eq!(grads.weights[h][idx], numeric, epsilon = 1e-6);
        }

        let mut x_plus = x.clone();
        x_plus[(1, 2)] += eps;
        let mut x_minus = x.clone();
        x_minus[(1, 2)] -= eps;
        let numeric = ((&layer.forward(&x_plus, &hoods, None).0 * &weights_out).sum()
            - (&layer.forward(&x_minus, &hoods, None).0 * &weights_out).sum())
            / (2.0 * eps);
        assert_abs_diff_eq!(d_x[(1, 2)], numeric, epsilon = 1e-6);
    }
}
