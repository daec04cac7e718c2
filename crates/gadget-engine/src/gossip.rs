// crates/gadget-engine/src/gossip.rs
//
// Gossip averaging strategies.
//
// Uniform-pairwise, single-phase push-sum and matrix-weighted gossip read a
// peer's state and write results immediately. They are not reentrant and rely
// on the scheduler activating one node at a time. Two-phase push-sum only
// writes the activating node's staging buffer during a send, so any
// activation order within a cycle sees the same snapshot.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use gadget_core::{MixingMatrix, NodeId, Topology, WeightVector};

use crate::config::WriteBack;
use crate::node::{Node, PushSumBuffer};

/// Mutable access to two distinct nodes.
fn pair_mut(nodes: &mut [Node], a: NodeId, b: NodeId) -> (&mut Node, &mut Node) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = nodes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = nodes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Uniformly pick an alive neighbor of `id`.
fn pick_alive_neighbor(
    id: NodeId,
    topology: &dyn Topology,
    node_count: usize,
    rng: &mut StdRng,
) -> Option<NodeId> {
    let candidates: Vec<NodeId> = topology
        .alive_neighbors(id)
        .into_iter()
        .filter(|&j| j != id && j < node_count)
        .collect();
    candidates.choose(rng).copied()
}

/// Alive neighbors of `id` and the mixing weight `id` would have given the
/// dead ones, which stays with `id`.
fn split_neighbors(
    id: NodeId,
    topology: &dyn Topology,
    matrix: &MixingMatrix,
) -> (Vec<NodeId>, f64) {
    let mut alive = Vec::new();
    let mut retained = matrix.get(id, id);
    for &j in topology.neighbors(id) {
        if j == id {
            continue;
        }
        if topology.is_alive(j) {
            alive.push(j);
        } else {
            retained += matrix.get(id, j);
        }
    }
    (alive, retained)
}

/// Replace the node's vector with `local + peer` over the union of dimensions.
///
/// With `WriteBack::Symmetric` the peer receives the same sum. Returns the
/// chosen peer, or `None` when no neighbor is alive.
pub fn uniform_pairwise(
    nodes: &mut [Node],
    id: NodeId,
    topology: &dyn Topology,
    rng: &mut StdRng,
    write_back: WriteBack,
) -> Option<NodeId> {
    let peer_id = pick_alive_neighbor(id, topology, nodes.len(), rng)?;
    let (node, peer) = pair_mut(nodes, id, peer_id);

    let mut sum = node.weights.clone();
    sum.add_scaled(&peer.weights, 1.0);
    if write_back == WriteBack::Symmetric {
        peer.weights = sum.clone();
    }
    node.weights = sum;
    Some(peer_id)
}

/// Write `(local + peer) / 2` into both the node and one random alive neighbor.
pub fn pushsum_single_phase(
    nodes: &mut [Node],
    id: NodeId,
    topology: &dyn Topology,
    rng: &mut StdRng,
) -> Option<NodeId> {
    let peer_id = pick_alive_neighbor(id, topology, nodes.len(), rng)?;
    let (node, peer) = pair_mut(nodes, id, peer_id);

    let mut avg = node.weights.clone();
    avg.add_scaled(&peer.weights, 1.0);
    avg.scale(0.5);
    peer.weights = avg.clone();
    node.weights = avg;
    Some(peer_id)
}

/// `w_i <- B_ii' * w_i + sum_j B_ij * w_j` over alive neighbors `j`, where
/// `B_ii'` also holds the weight of dead neighbors. Returns the number of
/// neighbors mixed in.
pub fn matrix_weighted(
    nodes: &mut [Node],
    id: NodeId,
    topology: &dyn Topology,
    matrix: &MixingMatrix,
) -> usize {
    let (alive, retained) = split_neighbors(id, topology, matrix);
    let mut mixed = WeightVector::new();
    mixed.add_scaled(&nodes[id].weights, retained);
    for &j in &alive {
        mixed.add_scaled(&nodes[j].weights, matrix.get(id, j));
    }
    nodes[id].weights = mixed;
    alive.len()
}

/// Send sub-phase of two-phase push-sum: stage
/// `B_ii' * (w_i, m_i) + sum_j B_ji * (w_j, m_j)` over alive neighbors `j`.
///
/// Reads only published `(w, mass)` state and writes only the node's own
/// staging buffer. Returns the number of neighbors read.
pub fn pushsum_send(
    nodes: &mut [Node],
    id: NodeId,
    topology: &dyn Topology,
    matrix: &MixingMatrix,
) -> usize {
    let (alive, retained) = split_neighbors(id, topology, matrix);
    let own = &nodes[id];
    let mut weights = WeightVector::new();
    weights.add_scaled(&own.weights, retained);
    let mut mass = retained * own.mass;
    for &j in &alive {
        let share = matrix.get(j, id);
        weights.add_scaled(&nodes[j].weights, share);
        mass += share * nodes[j].mass;
    }
    nodes[id].staged = Some(PushSumBuffer { weights, mass });
    alive.len()
}

/// Receive sub-phase: adopt the staged buffer. Returns false if nothing was staged.
pub fn pushsum_receive(node: &mut Node) -> bool {
    node.consume_staged()
}
