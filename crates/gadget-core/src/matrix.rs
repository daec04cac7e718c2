// crates/gadget-core/src/matrix.rs
//
// Square matrices indexed by node identity: the 0/1 adjacency handed to a
// mixing oracle and the real-valued mixing matrix it returns.

use serde::{Deserialize, Serialize};

use crate::error::GadgetError;
use crate::traits::Topology;
use crate::NodeId;

/// Square 0/1 adjacency matrix: `links[i][j]` is true if `j` is a neighbor of `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacency {
    links: Vec<Vec<bool>>,
}

impl Adjacency {
    /// Create an `n x n` adjacency with no links.
    pub fn new(n: usize) -> Self {
        Self {
            links: vec![vec![false; n]; n],
        }
    }

    /// Snapshot the neighbor lists of a topology provider.
    pub fn from_topology(topology: &dyn Topology) -> Self {
        let n = topology.size();
        let mut adj = Self::new(n);
        for i in topology.all_nodes() {
            for &j in topology.neighbors(i) {
                if j < n {
                    adj.links[i][j] = true;
                }
            }
        }
        adj
    }

    /// Number of rows (= columns).
    pub fn size(&self) -> usize {
        self.links.len()
    }

    /// Mark `j` as a neighbor of `i`.
    pub fn link(&mut self, i: NodeId, j: NodeId) {
        self.links[i][j] = true;
    }

    /// Whether `j` is a neighbor of `i`. Self-links are ignored by oracles.
    pub fn is_linked(&self, i: NodeId, j: NodeId) -> bool {
        self.links[i][j]
    }

    /// Out-degree of `i`, not counting a self-link.
    pub fn degree(&self, i: NodeId) -> usize {
        self.links[i]
            .iter()
            .enumerate()
            .filter(|(j, &l)| l && *j != i)
            .count()
    }

    /// Largest degree over all nodes (0 for an empty matrix).
    pub fn max_degree(&self) -> usize {
        (0..self.size()).map(|i| self.degree(i)).max().unwrap_or(0)
    }

    /// True if `i -> j` implies `j -> i` for every pair.
    pub fn is_symmetric(&self) -> bool {
        let n = self.size();
        (0..n).all(|i| (0..n).all(|j| self.links[i][j] == self.links[j][i]))
    }
}

/// Square matrix of pairwise mixing weights, `B[i][j]`.
///
/// Rows sum to ~1 (row-stochastic); for the doubly-stochastic variants the
/// columns do as well. Immutable once produced by an oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixingMatrix {
    weights: Vec<Vec<f64>>,
}

impl MixingMatrix {
    /// Create an `n x n` zero matrix.
    pub fn zeros(n: usize) -> Self {
        Self {
            weights: vec![vec![0.0; n]; n],
        }
    }

    /// Create the `n x n` identity (no mixing at all).
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.weights[i][i] = 1.0;
        }
        m
    }

    /// Build from row vectors. Fails if the rows do not form a square matrix.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, GadgetError> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(GadgetError::MixingOracle(format!(
                "row {} has {} entries, expected {}",
                i,
                row.len(),
                n
            )));
        }
        Ok(Self { weights: rows })
    }

    /// Build from a row-major flat array of `n * n` values.
    pub fn from_flat(n: usize, values: &[f64]) -> Result<Self, GadgetError> {
        if values.len() != n * n {
            return Err(GadgetError::MixingOracle(format!(
                "flat matrix has {} values, expected {}",
                values.len(),
                n * n
            )));
        }
        let rows = values.chunks(n.max(1)).take(n).map(<[f64]>::to_vec).collect();
        Ok(Self { weights: rows })
    }

    /// Number of rows (= columns).
    pub fn size(&self) -> usize {
        self.weights.len()
    }

    /// `B[i][j]`.
    pub fn get(&self, i: NodeId, j: NodeId) -> f64 {
        self.weights[i][j]
    }

    /// Set `B[i][j]`.
    pub fn set(&mut self, i: NodeId, j: NodeId, value: f64) {
        self.weights[i][j] = value;
    }

    /// Row-major view of the weights.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.weights
    }

    /// Sum of row `i`.
    pub fn row_sum(&self, i: NodeId) -> f64 {
        self.weights[i].iter().sum()
    }

    /// Sum of column `j`.
    pub fn column_sum(&self, j: NodeId) -> f64 {
        self.weights.iter().map(|row| row[j]).sum()
    }

    /// Every row sums to 1 within `tolerance`.
    pub fn is_row_stochastic(&self, tolerance: f64) -> bool {
        (0..self.size()).all(|i| (self.row_sum(i) - 1.0).abs() <= tolerance)
    }

    /// Every row and every column sums to 1 within `tolerance`.
    pub fn is_doubly_stochastic(&self, tolerance: f64) -> bool {
        self.is_row_stochastic(tolerance)
            && (0..self.size()).all(|j| (self.column_sum(j) - 1.0).abs() <= tolerance)
    }

    /// Check the matrix can drive a network of `n` nodes.
    pub fn ensure_size(&self, n: usize) -> Result<(), GadgetError> {
        if self.size() != n {
            return Err(GadgetError::MixingOracle(format!(
                "mixing matrix is {0}x{0}, network has {1} nodes",
                self.size(),
                n
            )));
        }
        Ok(())
    }
}
