// crates/gadget-core/src/traits.rs

use crate::error::GadgetError;
use crate::matrix::{Adjacency, MixingMatrix};
use crate::NodeId;

/// Network/topology provider: who is connected to whom, and who is alive.
///
/// Implemented by gadget-topology (`Graph`).
pub trait Topology: Send + Sync {
    /// Number of nodes in the network. Node ids are `0..size()`.
    fn size(&self) -> usize;

    /// Current neighbor set of `node`, in a stable order.
    fn neighbors(&self, node: NodeId) -> &[NodeId];

    /// Whether `node` is alive. Dead nodes are never gossiped with.
    fn is_alive(&self, node: NodeId) -> bool;

    /// Enumerate every node id.
    fn all_nodes(&self) -> Vec<NodeId> {
        (0..self.size()).collect()
    }

    /// Neighbors of `node` that are currently alive.
    fn alive_neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.neighbors(node)
            .iter()
            .copied()
            .filter(|&n| self.is_alive(n))
            .collect()
    }
}

/// Mixing-matrix oracle: turns a 0/1 adjacency matrix into pairwise mixing weights.
///
/// Implemented by gadget-topology (Metropolis-Hastings, max-degree, Sinkhorn, file).
pub trait MixingOracle: Send + Sync {
    /// Short human-readable name used in logs.
    fn name(&self) -> &str;

    /// Compute a square (near-)doubly-stochastic matrix for `adjacency`.
    fn compute(&self, adjacency: &Adjacency) -> Result<MixingMatrix, GadgetError>;
}
