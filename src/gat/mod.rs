//! Graph Attention Network implementation
//!
//! Provides GAT layers and the two-layer node classifier, with hand-written
//! reverse-mode gradients for training.

mod attention;
mod layer;
mod network;

pub use attention::{elu, log_softmax_rows, softmax_rows, AttentionCache, AttentionGrads, AttentionHead};
pub use layer::{GraphAttentionLayer, LayerCache, LayerGradients};
pub use network::{GraphAttentionNetwork, Mode};
