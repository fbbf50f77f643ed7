//! Graph data structures
//!
//! Citation graphs are stored as CSR over incoming edges so that each node's
//! attention neighbourhood is a contiguous slice.

mod sparse;

pub use sparse::SparseGraph;
