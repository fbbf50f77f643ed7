//! Attention mechanisms for GAT
//!
//! A single attention head computes, for every target node `i` and each
//! source `j` in its neighbourhood (self included):
//!
//! ```text
//! u_ij  = a_src · z_j + a_dst · z_i
//! α_ij  = softmax_j(LeakyReLU(u_ij))
//! out_i = Σ_j α_ij z_j
//! ```
//!
//! The head works on plain `ndarray` values: transformed features `z`,
//! neighbourhood lists and its two attention vectors go in, the aggregated
//! representation and the cached coefficients come out. Nothing here depends
//! on the rest of the network, so the same head can be driven by any layer.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Single attention head
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionHead {
    /// Attention vector applied to the source node
    pub(crate) att_src: Array1<f64>,
    /// Attention vector applied to the target node
    pub(crate) att_dst: Array1<f64>,
    /// Negative slope for LeakyReLU
    negative_slope: f64,
    /// Dropout rate on attention coefficients
    dropout_rate: f64,
}

/// Values saved by a forward pass, indexed edge by edge in neighbourhood order
#[derive(Debug, Clone)]
pub struct AttentionCache {
    /// Start of each node's edge range; `offsets[n]` is the edge count
    offsets: Vec<usize>,
    /// Pre-activation scores `u_ij`
    scores: Vec<f64>,
    /// Softmax coefficients `α_ij` before dropout
    alpha: Vec<f64>,
    /// Dropout multipliers, present only in training mode
    mask: Option<Vec<f64>>,
}

/// Gradients produced by [`AttentionHead::backward`]
#[derive(Debug, Clone)]
pub struct AttentionGrads {
    /// Gradient with respect to the transformed features `z`
    pub d_z: Array2<f64>,
    pub d_att_src: Array1<f64>,
    pub d_att_dst: Array1<f64>,
}

impl AttentionHead {
    /// Create a new attention head with Glorot-uniform attention vectors
    pub fn new(dim: usize, num_heads: usize, negative_slope: f64, dropout_rate: f64, rng: &mut StdRng) -> Self {
        // Glorot over the (heads, dim) attention tensor
        let limit = (6.0 / (num_heads + dim) as f64).sqrt();
        let att_src = Array1::from_iter((0..dim).map(|_| rng.gen_range(-limit..limit)));
        let att_dst = Array1::from_iter((0..dim).map(|_| rng.gen_range(-limit..limit)));

        Self {
            att_src,
            att_dst,
            negative_slope,
            dropout_rate,
        }
    }

    /// Aggregate neighbour features
    ///
    /// `hoods[i]` lists the source nodes attended by node `i`. Passing an RNG
    /// enables dropout on the coefficients (training mode).
    pub fn forward(
        &self,
        z: &Array2<f64>,
        hoods: &[Vec<usize>],
        rng: Option<&mut StdRng>,
    ) -> (Array2<f64>, AttentionCache) {
        let n = z.nrows();
        let src_term = z.dot(&self.att_src);
        let dst_term = z.dot(&self.att_dst);

        let mut offsets = Vec::with_capacity(n + 1);
        offsets.push(0);
        let mut scores = Vec::new();
        let mut alpha = Vec::new();

        for (i, hood) in hoods.iter().enumerate() {
            let start = scores.len();
            scores.extend(hood.iter().map(|&j| src_term[j] + dst_term[i]));
            let activated: Vec<f64> = scores[start..]
                .iter()
                .map(|&u| leaky_relu(u, self.negative_slope))
                .collect();
            alpha.extend(softmax(&activated).iter());
            offsets.push(scores.len());
        }

        let mask = match rng {
            Some(rng) if self.dropout_rate > 0.0 => {
                let keep = 1.0 - self.dropout_rate;
                Some(
                    (0..alpha.len())
                        .map(|_| if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 })
                        .collect::<Vec<f64>>(),
                )
            }
            _ => None,
        };

        let mut output = Array2::zeros((n, z.ncols()));
        for (i, hood) in hoods.iter().enumerate() {
            let mut row = output.row_mut(i);
            for (k, &j) in hood.iter().enumerate() {
                let e = offsets[i] + k;
                let beta = alpha[e] * mask.as_ref().map_or(1.0, |m| m[e]);
                if beta != 0.0 {
                    row.scaled_add(beta, &z.row(j));
                }
            }
        }

        let cache = AttentionCache {
            offsets,
            scores,
            alpha,
            mask,
        };
        (output, cache)
    }

    /// Back-propagate `d_out` (gradient of the aggregated output) through
    /// the aggregation, softmax and LeakyReLU into `z` and the attention vectors
    pub fn backward(
        &self,
        z: &Array2<f64>,
        hoods: &[Vec<usize>],
        cache: &AttentionCache,
        d_out: ArrayView2<f64>,
    ) -> AttentionGrads {
        let n = z.nrows();
        let mut d_z = Array2::zeros(z.dim());
        let mut d_src_term = Array1::<f64>::zeros(n);
        let mut d_dst_term = Array1::<f64>::zeros(n);

        for (i, hood) in hoods.iter().enumerate() {
            let start = cache.offsets[i];
            let d_out_i = d_out.row(i);

            // d alpha through the dropout mask
            let d_alpha: Vec<f64> = hood
                .iter()
                .enumerate()
                .map(|(k, &j)| {
                    let e = start + k;
                    let m = cache.mask.as_ref().map_or(1.0, |m| m[e]);
                    let beta = cache.alpha[e] * m;
                    if beta != 0.0 {
                        d_z.row_mut(j).scaled_add(beta, &d_out_i);
                    }
                    if m == 0.0 {
                        0.0
                    } else {
                        d_out_i.dot(&z.row(j)) * m
                    }
                })
                .collect();

            let alpha = &cache.alpha[start..start + hood.len()];
            let weighted: f64 = alpha.iter().zip(&d_alpha).map(|(a, d)| a * d).sum();

            for (k, &j) in hood.iter().enumerate() {
                let d_e = alpha[k] * (d_alpha[k] - weighted);
                let u = cache.scores[start + k];
                let d_u = if u >= 0.0 { d_e } else { d_e * self.negative_slope };
                d_src_term[j] += d_u;
                d_dst_term[i] += d_u;
            }
        }

        let d_att_src = z.t().dot(&d_src_term);
        let d_att_dst = z.t().dot(&d_dst_term);

        // z_j feeds the source term, z_i the target term
        let src_col = d_src_term.insert_axis(Axis(1));
        let dst_col = d_dst_term.insert_axis(Axis(1));
        d_z += &src_col.dot(&self.att_src.view().insert_axis(Axis(0)));
        d_z += &dst_col.dot(&self.att_dst.view().insert_axis(Axis(0)));

        AttentionGrads {
            d_z,
            d_att_src,
            d_att_dst,
        }
    }
}

/// LeakyReLU activation
pub(crate) fn leaky_relu(x: f64, negative_slope: f64) -> f64 {
    if x >= 0.0 {
        x
    } else {
        negative_slope * x
    }
}

/// Softmax function
fn softmax(scores: &[f64]) -> Array1<f64> {
    if scores.is_empty() {
        return Array1::zeros(0);
    }

    // Numerical stability: subtract max
    let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp_scores: Vec<f64> = scores.iter().map(|&s| (s - max_score).exp()).collect();
    let sum: f64 = exp_scores.iter().sum();

    Array1::from_iter(exp_scores.iter().map(|&e| e / sum))
}

/// ELU activation
pub fn elu(x: f64, alpha: f64) -> f64 {
    if x >= 0.0 {
        x
    } else {
        alpha * (x.exp() - 1.0)
    }
}

/// Derivative of ELU evaluated at the pre-activation `x`
pub fn elu_grad(x: f64, alpha: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        alpha * x.exp()
    }
}

/// Row-wise log-softmax
pub fn log_softmax_rows(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f64>().ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }
    out
}

/// Row-wise softmax
pub fn softmax_rows(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    out
}
