// crates/gadget-topology/src/lib.rs
//
// gadget-topology: Network topologies and mixing-matrix oracles.
//
// This crate plays the two external collaborators of the learning engine:
// the topology provider (who neighbors whom, who is alive) and the oracle
// that turns the topology's adjacency into a matrix of mixing weights.

pub mod graph;
pub mod mixing;

pub use graph::{Graph, TopologyKind};
pub use mixing::{FileOracle, MaxDegree, MetropolisHastings, OracleKind, Sinkhorn};
