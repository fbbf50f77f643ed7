//! Graph Attention Networks on the Cora citation graph
//!
//! This crate trains a two-layer Graph Attention Network (GAT) for node
//! classification, scores it with one-vs-rest ROC AUC, and runs Local Outlier
//! Factor over the learned embeddings to look for nodes whose features were
//! replaced with noise.
//!
//! # Features
//!
//! - **Graph**: CSR adjacency over incoming edges
//! - **Data**: Cora download and parsing, planetoid-style split, synthetic graphs
//! - **GAT**: Multi-head attention with hand-written gradients
//! - **Training**: Full-batch Adam on the masked NLL loss
//! - **Evaluation**: Test loss, accuracy and macro AUC, LOF outlier labels
//!
//! # Example
//!
//! ```rust,no_run
//! use gat_citation::{
//!     anomaly::AnomalyInjector, config::ExperimentConfig, data::CoraLoader, eval::Evaluator,
//!     gat::GraphAttentionNetwork, optim::Adam, train::Trainer,
//! };
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! fn main() -> gat_citation::Result<()> {
//!     let config = ExperimentConfig::default();
//!     let mut rng = StdRng::seed_from_u64(config.seed);
//!
//!     let mut dataset = CoraLoader::new(&config.data_root).load(&config.split, &mut rng)?;
//!     AnomalyInjector::new(config.anomaly_indices.clone()).inject(&mut dataset, &mut rng)?;
//!
//!     let mut model = GraphAttentionNetwork::new(
//!         dataset.num_features(),
//!         dataset.num_classes(),
//!         &config.model,
//!         &mut rng,
//!     )?;
//!     let mut adam = Adam::new(config.train.learning_rate);
//!     Trainer::new(config.train.clone()).train(&mut model, &dataset, &mut adam, &mut rng)?;
//!
//!     model.eval();
//!     let evaluation = Evaluator::new(config.lof.clone()).evaluate(&model, &dataset)?;
//!     println!("{}", evaluation.summary_line());
//!     Ok(())
//! }
//! ```

pub mod anomaly;
pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod gat;
pub mod graph;
pub mod optim;
pub mod train;

// Re-export commonly used types
pub use anomaly::{AnomalyInjector, LocalOutlierFactor, OutlierDetector};
pub use config::ExperimentConfig;
pub use data::{CoraLoader, Dataset};
pub use error::{Error, Result};
pub use eval::{Evaluation, Evaluator};
pub use gat::{GraphAttentionLayer, GraphAttentionNetwork};
pub use graph::SparseGraph;
pub use optim::{Adam, Optimizer};
pub use train::{Trainer, TrainingHistory};
