// crates/gadget-engine/src/lib.rs
//
// gadget-engine: the per-node learning and gossip engine.
//
// Each node runs a PEGASOS-style hinge-loss sub-gradient step on its private
// shard, averages its weight vector with neighbors through one of several
// gossip strategies, and projects the result onto the SVM norm ball. A
// network-wide observer decides when gossip has converged, and a cycle
// scheduler plays the role of the discrete-event host.

pub mod config;
pub mod context;
pub mod engine;
pub mod evaluate;
pub mod gossip;
pub mod local_update;
pub mod node;
pub mod observer;
pub mod phase;
pub mod projection;
pub mod scheduler;

pub use config::{DecayMode, EngineConfig, GossipVariant, ProjectionMode, WriteBack};
pub use context::{MixingCache, SimulationContext};
pub use engine::{CycleReport, GadgetEngine};
pub use evaluate::{evaluate, Evaluation};
pub use local_update::{local_update, LocalStep};
pub use node::{Node, PushSumBuffer};
pub use observer::{ConvergenceObserver, DimensionStats, Observation};
pub use phase::{Phase, PhaseMachine};
pub use projection::{project, projection_scale};
pub use scheduler::{ActivationOrder, CycleScheduler, RunSummary};
