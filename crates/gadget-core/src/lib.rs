// crates/gadget-core/src/lib.rs
//
// gadget-core: Core types, traits, and errors for the GADGET gossip SVM simulator.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the sparse weight vector, labeled training examples, the mixing
// matrix, the error type, and the collaborator traits (topology provider and
// mixing-matrix oracle) the learning engine is written against.

pub mod dataset;
pub mod error;
pub mod matrix;
pub mod traits;
pub mod weights;

/// Stable integer identity of a simulated peer. Also the row/column index
/// into a `MixingMatrix`.
pub type NodeId = usize;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use gadget_core::WeightVector;`

// Data model
pub use dataset::{
    load_svmlight, parse_svmlight, partition, slice_lines, Label, PartitionStrategy,
    TrainingExample,
};
pub use matrix::{Adjacency, MixingMatrix};
pub use weights::WeightVector;

// Error type
pub use error::GadgetError;

// Traits
pub use traits::{MixingOracle, Topology};
