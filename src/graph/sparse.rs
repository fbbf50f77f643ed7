//! Sparse graph representation using CSR format
//!
//! Rows are indexed by the *target* node: row `i` holds the source nodes
//! whose messages node `i` aggregates during attention.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Compressed Sparse Row (CSR) graph over incoming edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseGraph {
    /// Number of nodes
    n_nodes: usize,
    /// Row pointers: indptr[i] to indptr[i+1] gives the in-edge range of node i
    indptr: Vec<usize>,
    /// Source node of each edge
    indices: Vec<usize>,
}

impl SparseGraph {
    /// Create a graph with no edges
    pub fn new(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            indptr: vec![0; n_nodes + 1],
            indices: Vec::new(),
        }
    }

    /// Create from a directed `(source, target)` edge list
    ///
    /// Duplicate edges are collapsed. Fails if any endpoint is not a valid node.
    pub fn from_edge_index(n_nodes: usize, edges: &[(usize, usize)]) -> Result<Self> {
        if let Some(&(src, dst)) = edges.iter().find(|&&(s, t)| s >= n_nodes || t >= n_nodes) {
            return Err(Error::InvalidDataset(format!(
                "edge ({}, {}) references a node outside 0..{}",
                src, dst, n_nodes
            )));
        }
        Ok(Self::build(n_nodes, edges.iter().copied()))
    }

    /// Assemble CSR from edges already known to be in range
    fn build(n_nodes: usize, edges: impl Iterator<Item = (usize, usize)>) -> Self {
        let mut by_target: Vec<(usize, usize)> = edges.map(|(s, t)| (t, s)).collect();
        by_target.sort_unstable();
        by_target.dedup();

        let mut indptr = vec![0usize; n_nodes + 1];
        let mut indices = Vec::with_capacity(by_target.len());

        for &(dst, src) in &by_target {
            indptr[dst + 1] += 1;
            indices.push(src);
        }
        for i in 0..n_nodes {
            indptr[i + 1] += indptr[i];
        }

        Self {
            n_nodes,
            indptr,
            indices,
        }
    }

    /// Get number of nodes
    pub fn num_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Get number of directed edges
    pub fn num_edges(&self) -> usize {
        self.indices.len()
    }

    /// Source nodes of the edges pointing at `node`, sorted ascending
    pub fn neighbors(&self, node: usize) -> &[usize] {
        let start = self.indptr[node];
        let end = self.indptr[node + 1];
        &self.indices[start..end]
    }

    /// Get in-degree of a node
    pub fn degree(&self, node: usize) -> usize {
        self.indptr[node + 1] - self.indptr[node]
    }

    /// Check if the edge `src -> dst` exists
    pub fn has_edge(&self, src: usize, dst: usize) -> bool {
        self.neighbors(dst).binary_search(&src).is_ok()
    }

    /// Iterate over all `(source, target)` pairs
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n_nodes).flat_map(move |dst| self.neighbors(dst).iter().map(move |&src| (src, dst)))
    }

    /// Check if graph is symmetric
    pub fn is_symmetric(&self) -> bool {
        self.edges().all(|(src, dst)| self.has_edge(dst, src))
    }

    /// Make graph symmetric by adding reverse edges
    pub fn make_symmetric(&self) -> Self {
        let edges: Vec<(usize, usize)> = self
            .edges()
            .flat_map(|(src, dst)| [(src, dst), (dst, src)])
            .collect();
        Self::build(self.n_nodes, edges.into_iter())
    }

    /// Add a self-loop to every node that lacks one
    pub fn add_self_loops(&self) -> Self {
        let edges: Vec<(usize, usize)> = self.edges().chain((0..self.n_nodes).map(|i| (i, i))).collect();
        Self::build(self.n_nodes, edges.into_iter())
    }

    /// Attention neighbourhood `N(i) ∪ {i}` of every node
    pub fn neighborhoods_with_self(&self) -> Vec<Vec<usize>> {
        (0..self.n_nodes)
            .map(|i| {
                let mut hood: Vec<usize> = self.neighbors(i).iter().copied().filter(|&j| j != i).collect();
                hood.push(i);
                hood
            })
            .collect()
    }
}
