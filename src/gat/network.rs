//! Graph Attention Network
//!
//! Two-layer GAT for node classification:
//! - Layer 1: multi-head attention, heads concatenated, ELU, dropout
//! - Layer 2: single head, averaged, log-softmax over classes

use ndarray::{Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::attention::{elu, elu_grad, log_softmax_rows, softmax_rows};
use super::layer::{GraphAttentionLayer, LayerCache};
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::graph::SparseGraph;
use crate::optim::Optimizer;

/// Computation mode of the network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Dropout on, activations cached for backward
    #[default]
    Train,
    /// Deterministic forward, nothing cached
    Eval,
}

/// Everything the backward pass needs from the last training forward
#[derive(Debug, Clone)]
struct ForwardCache {
    hoods: Vec<Vec<usize>>,
    layer1: LayerCache,
    /// Layer 1 output before ELU
    hidden_pre: Array2<f64>,
    hidden_mask: Option<Array2<f64>>,
    layer2: LayerCache,
    log_probs: Array2<f64>,
}

/// Graph Attention Network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphAttentionNetwork {
    /// Input feature dimension
    input_dim: usize,
    /// Hidden dimension per head
    hidden_dim: usize,
    /// Number of attention heads in the first layer
    num_heads: usize,
    /// Number of output classes
    num_classes: usize,
    /// Dropout rate on the first layer's input
    dropout: f64,
    /// Dropout rate on hidden activations after ELU
    hidden_dropout: f64,
    /// ELU alpha
    elu_alpha: f64,
    /// GAT layers
    layers: Vec<GraphAttentionLayer>,
    #[serde(skip)]
    mode: Mode,
    #[serde(skip)]
    cache: Option<ForwardCache>,
}

impl GraphAttentionNetwork {
    /// Create a new GAT network
    pub fn new(input_dim: usize, num_classes: usize, config: &ModelConfig, rng: &mut StdRng) -> Result<Self> {
        if input_dim == 0 || num_classes == 0 || config.hidden_dim == 0 || config.num_heads == 0 {
            return Err(Error::InvalidInput(format!(
                "GAT dimensions must be positive: input {}, classes {}, hidden {}, heads {}",
                input_dim, num_classes, config.hidden_dim, config.num_heads
            )));
        }
        for rate in [config.dropout, config.hidden_dropout] {
            if !(0.0..1.0).contains(&rate) {
                return Err(Error::InvalidInput(format!(
                    "dropout must be in [0, 1), got {}",
                    rate
                )));
            }
        }

        let layer1 = GraphAttentionLayer::new(
            input_dim,
            config.hidden_dim,
            config.num_heads,
            true, // Concatenate
            config.dropout,
            config.negative_slope,
            rng,
        );

        let layer2 = GraphAttentionLayer::new(
            config.hidden_dim * config.num_heads,
            num_classes,
            1,     // Single head for output
            false, // Average
            config.dropout,
            config.negative_slope,
            rng,
        );

        Ok(Self {
            input_dim,
            hidden_dim: config.hidden_dim,
            num_heads: config.num_heads,
            num_classes,
            dropout: config.dropout,
            hidden_dropout: config.hidden_dropout,
            elu_alpha: config.elu_alpha,
            layers: vec![layer1, layer2],
            mode: Mode::Train,
            cache: None,
        })
    }

    /// Switch to training mode
    pub fn train(&mut self) {
        self.mode = Mode::Train;
    }

    /// Switch to evaluation mode and release cached activations
    pub fn eval(&mut self) {
        self.mode = Mode::Eval;
        self.cache = None;
    }

    /// Current computation mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Forward pass returning per-node class log-probabilities
    ///
    /// In training mode dropout is sampled from `rng` and activations are kept
    /// for [`backward`](Self::backward). In evaluation mode this is
    /// [`predict`](Self::predict).
    pub fn forward(&mut self, x: &Array2<f64>, graph: &SparseGraph, rng: &mut StdRng) -> Result<Array2<f64>> {
        if self.mode == Mode::Eval {
            return self.predict(x, graph);
        }
        self.check_input(x, graph)?;

        let hoods = graph.neighborhoods_with_self();

        let (input, _) = apply_dropout(x, self.dropout, rng);
        let (hidden_pre, layer1) = self.layers[0].forward(&input, &hoods, Some(&mut *rng));

        let activated = hidden_pre.mapv(|v| elu(v, self.elu_alpha));
        let (hidden, hidden_mask) = apply_dropout(&activated, self.hidden_dropout, rng);
        let (logits, layer2) = self.layers[1].forward(&hidden, &hoods, Some(&mut *rng));

        let log_probs = log_softmax_rows(&logits);

        self.cache = Some(ForwardCache {
            hoods,
            layer1,
            hidden_pre,
            hidden_mask,
            layer2,
            log_probs: log_probs.clone(),
        });

        Ok(log_probs)
    }

    /// Inference without dropout, caches or gradient buffers
    ///
    /// Borrows the network immutably, so parameters cannot change while it runs.
    pub fn predict(&self, x: &Array2<f64>, graph: &SparseGraph) -> Result<Array2<f64>> {
        self.check_input(x, graph)?;

        let hoods = graph.neighborhoods_with_self();
        let (hidden_pre, _) = self.layers[0].forward(x, &hoods, None);
        let hidden = hidden_pre.mapv(|v| elu(v, self.elu_alpha));
        let (logits, _) = self.layers[1].forward(&hidden, &hoods, None);

        Ok(log_softmax_rows(&logits))
    }

    /// Back-propagate the gradient of the loss with respect to the
    /// log-probabilities returned by the last training-mode forward
    pub fn backward(&mut self, d_log_probs: &Array2<f64>) -> Result<()> {
        let cache = self
            .cache
            .take()
            .ok_or_else(|| Error::InvalidInput("backward called without a training forward pass".into()))?;

        if d_log_probs.dim() != cache.log_probs.dim() {
            return Err(Error::shape(
                format!("{:?}", cache.log_probs.dim()),
                format!("{:?}", d_log_probs.dim()),
            ));
        }

        // Through log-softmax: d_logits = g - softmax * sum(g)
        let probs = cache.log_probs.mapv(f64::exp);
        let row_sums = d_log_probs.sum_axis(Axis(1)).insert_axis(Axis(1));
        let d_logits = d_log_probs - &(&probs * &row_sums);

        let d_hidden = self.layers[1]
            .backward(&cache.hoods, &cache.layer2, &d_logits, true)
            .ok_or_else(|| Error::InvalidInput("missing hidden gradient".into()))?;

        let d_activated = match &cache.hidden_mask {
            Some(mask) => d_hidden * mask,
            None => d_hidden,
        };

        let mut d_hidden_pre = d_activated;
        Zip::from(&mut d_hidden_pre)
            .and(&cache.hidden_pre)
            .for_each(|d, &pre| *d *= elu_grad(pre, self.elu_alpha));

        self.layers[0].backward(&cache.hoods, &cache.layer1, &d_hidden_pre, false);
        Ok(())
    }

    /// Clear accumulated gradients of every layer
    pub fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad();
        }
    }

    /// Apply one optimizer step with the accumulated gradients
    pub fn step(&mut self, optimizer: &mut dyn Optimizer) {
        optimizer.begin_step();
        let mut slot = 0;
        for layer in &mut self.layers {
            slot = layer.apply_gradients(optimizer, slot);
        }
    }

    fn check_input(&self, x: &Array2<f64>, graph: &SparseGraph) -> Result<()> {
        if x.ncols() != self.input_dim {
            return Err(Error::shape(
                format!("{} feature columns", self.input_dim),
                format!("{} feature columns", x.ncols()),
            ));
        }
        if x.nrows() != graph.num_nodes() {
            return Err(Error::shape(
                format!("{} feature rows (one per node)", graph.num_nodes()),
                format!("{} feature rows", x.nrows()),
            ));
        }
        Ok(())
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum()
    }

    /// Get input dimension
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Get hidden dimension
    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Get number of heads
    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// Get number of classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Get number of layers
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

/// Training utilities
impl GraphAttentionNetwork {
    /// Mean negative log-likelihood over the masked nodes
    pub fn nll_loss(log_probs: &Array2<f64>, labels: &[usize], mask: &[bool]) -> Result<f64> {
        check_targets(log_probs, labels, mask)?;

        let mut sum = 0.0;
        let mut count = 0usize;
        for (i, (&y, &m)) in labels.iter().zip(mask).enumerate() {
            if m {
                sum -= log_probs[[i, y]];
                count += 1;
            }
        }

        if count == 0 {
            return Err(Error::InsufficientData("loss mask selects no nodes".into()));
        }
        Ok(sum / count as f64)
    }

    /// Gradient of [`nll_loss`](Self::nll_loss) with respect to the log-probabilities
    pub fn nll_loss_grad(log_probs: &Array2<f64>, labels: &[usize], mask: &[bool]) -> Result<Array2<f64>> {
        check_targets(log_probs, labels, mask)?;

        let count = mask.iter().filter(|&&m| m).count();
        if count == 0 {
            return Err(Error::InsufficientData("loss mask selects no nodes".into()));
        }

        let mut grad = Array2::zeros(log_probs.dim());
        for (i, (&y, &m)) in labels.iter().zip(mask).enumerate() {
            if m {
                grad[[i, y]] = -1.0 / count as f64;
            }
        }
        Ok(grad)
    }

    /// Row-wise class probabilities from log-probabilities
    pub fn probabilities(log_probs: &Array2<f64>) -> Array2<f64> {
        softmax_rows(log_probs)
    }
}

/// Sample an inverted-dropout mask with drop probability `rate` and apply it
fn apply_dropout(x: &Array2<f64>, rate: f64, rng: &mut StdRng) -> (Array2<f64>, Option<Array2<f64>>) {
    if rate <= 0.0 {
        return (x.clone(), None);
    }

    let keep = 1.0 - rate;
    let mask = Array2::from_shape_fn(x.dim(), |_| {
        if rng.gen::<f64>() < keep {
            1.0 / keep // Scale to maintain expected value
        } else {
            0.0
        }
    });
    (x * &mask, Some(mask))
}

fn check_targets(log_probs: &Array2<f64>, labels: &[usize], mask: &[bool]) -> Result<()> {
    if labels.len() != log_probs.nrows() || mask.len() != log_probs.nrows() {
        return Err(Error::shape(
            format!("{} labels and mask entries", log_probs.nrows()),
            format!("{} labels, {} mask entries", labels.len(), mask.len()),
        ));
    }
    if let Some(&bad) = labels.iter().find(|&&y| y >= log_probs.ncols()) {
        return Err(Error::InvalidInput(format!(
            "label {} out of range for {} classes",
            bad,
            log_probs.ncols()
        )));
    }
    Ok(())
}
