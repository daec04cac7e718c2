// crates/gadget-topology/src/graph.rs
//
// In-memory peer graph implementing the `Topology` provider contract.
//
// Links are undirected: adding i-j makes each a neighbor of the other. Neighbor
// lists are kept sorted so gossip partner selection is reproducible for a
// given seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use gadget_core::{GadgetError, NodeId, Topology};

/// Shape of the generated network.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TopologyKind {
    /// Every node linked to every other node.
    #[default]
    Complete,
    /// Node i linked to i-1 and i+1 (mod n).
    Ring,
    /// No links at all.
    Isolated,
    /// Node 0 linked to everyone else.
    Star,
    /// Each node picks `degree` random peers; links are then made symmetric.
    RandomOut {
        /// Links chosen per node before symmetrisation.
        degree: usize,
    },
    /// Each pair linked independently with `probability`.
    ErdosRenyi {
        /// Link probability in [0, 1].
        probability: f64,
    },
}

impl TopologyKind {
    /// Build a graph of `n` nodes of this shape. `seed` drives random shapes.
    pub fn build(&self, n: usize, seed: u64) -> Result<Graph, GadgetError> {
        match self {
            TopologyKind::Complete => Ok(Graph::complete(n)),
            TopologyKind::Ring => Ok(Graph::ring(n)),
            TopologyKind::Isolated => Ok(Graph::isolated(n)),
            TopologyKind::Star => Ok(Graph::star(n)),
            TopologyKind::RandomOut { degree } => Graph::random_out(n, *degree, seed),
            TopologyKind::ErdosRenyi { probability } => Graph::erdos_renyi(n, *probability, seed),
        }
    }
}

/// Undirected peer graph with per-node alive flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Sorted neighbor list per node.
    neighbors: Vec<Vec<NodeId>>,
    /// Alive predicate per node (all alive at construction).
    alive: Vec<bool>,
}

impl Graph {
    /// Graph of `n` nodes and no links.
    pub fn isolated(n: usize) -> Self {
        Self {
            neighbors: vec![Vec::new(); n],
            alive: vec![true; n],
        }
    }

    /// Fully connected graph.
    pub fn complete(n: usize) -> Self {
        let mut g = Self::isolated(n);
        for i in 0..n {
            for j in (i + 1)..n {
                g.link(i, j);
            }
        }
        g
    }

    /// Cycle 0-1-...-(n-1)-0.
    pub fn ring(n: usize) -> Self {
        let mut g = Self::isolated(n);
        if n > 1 {
            for i in 0..n {
                g.link(i, (i + 1) % n);
            }
        }
        g
    }

    /// Hub-and-spoke graph centred on node 0.
    pub fn star(n: usize) -> Self {
        let mut g = Self::isolated(n);
        for i in 1..n {
            g.link(0, i);
        }
        g
    }

    /// Each node links to `k` distinct random peers; links are symmetric, so
    /// final degrees are at least `k` (capped at `n - 1`).
    pub fn random_out(n: usize, k: usize, seed: u64) -> Result<Self, GadgetError> {
        if n > 0 && k >= n {
            return Err(GadgetError::Topology(format!(
                "random-out degree {} needs more than {} nodes",
                k, n
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut g = Self::isolated(n);
        for i in 0..n {
            let mut others: Vec<NodeId> = (0..n).filter(|&j| j != i).collect();
            others.shuffle(&mut rng);
            for &j in others.iter().take(k) {
                g.link(i, j);
            }
        }
        Ok(g)
    }

    /// G(n, p) random graph.
    pub fn erdos_renyi(n: usize, p: f64, seed: u64) -> Result<Self, GadgetError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(GadgetError::Topology(format!(
                "link probability {} outside [0, 1]",
                p
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut g = Self::isolated(n);
        for i in 0..n {
            for j in (i + 1)..n {
                if rng.gen_bool(p) {
                    g.link(i, j);
                }
            }
        }
        Ok(g)
    }

    /// Graph with the given undirected edges. Self-loops are ignored.
    pub fn from_edges(n: usize, edges: &[(NodeId, NodeId)]) -> Result<Self, GadgetError> {
        let mut g = Self::isolated(n);
        for &(a, b) in edges {
            if a >= n || b >= n {
                return Err(GadgetError::Topology(format!(
                    "edge ({}, {}) out of range for {} nodes",
                    a, b, n
                )));
            }
            g.link(a, b);
        }
        Ok(g)
    }

    /// Add the undirected link a-b. Duplicate links and self-loops are ignored.
    pub fn link(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        for (from, to) in [(a, b), (b, a)] {
            let list = &mut self.neighbors[from];
            if let Err(pos) = list.binary_search(&to) {
                list.insert(pos, to);
            }
        }
    }

    /// Flip the alive predicate for `node`.
    pub fn set_alive(&mut self, node: NodeId, alive: bool) -> Result<(), GadgetError> {
        let slot = self
            .alive
            .get_mut(node)
            .ok_or_else(|| GadgetError::NotFound(format!("node {}", node)))?;
        *slot = alive;
        tracing::debug!(node, alive, "Node liveness changed");
        Ok(())
    }

    /// Degree of `node`.
    pub fn degree(&self, node: NodeId) -> usize {
        self.neighbors[node].len()
    }

    /// Number of undirected links.
    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// True if every node can reach every other node.
    pub fn is_connected(&self) -> bool {
        let n = self.neighbors.len();
        if n == 0 {
            return true;
        }
        let mut seen = vec![false; n];
        let mut stack = vec![0];
        seen[0] = true;
        while let Some(i) = stack.pop() {
            for &j in &self.neighbors[i] {
                if !seen[j] {
                    seen[j] = true;
                    stack.push(j);
                }
            }
        }
        seen.into_iter().all(|s| s)
    }
}

impl Topology for Graph {
    fn size(&self) -> usize {
        self.neighbors.len()
    }

    fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.neighbors[node]
    }

    fn is_alive(&self, node: NodeId) -> bool {
        self.alive.get(node).copied().unwrap_or(false)
    }
}
