// crates/gadget-engine/src/node.rs
//
// Per-node learner state.

use serde::Serialize;

use gadget_core::{GadgetError, NodeId, TrainingExample, WeightVector};

use crate::config::DecayMode;
use crate::local_update::{local_update, LocalStep};
use crate::phase::{Phase, PhaseMachine};

/// Push-sum value and mass staged during a send sub-phase, consumed on the
/// node's next activation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushSumBuffer {
    pub weights: WeightVector,
    pub mass: f64,
}

/// One simulated learner: a private shard plus the model it is training.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    shard: Vec<TrainingExample>,
    /// Current weight vector (push-sum value for the two-phase variant).
    pub weights: WeightVector,
    /// Push-sum mass; only meaningful for the two-phase variant.
    pub mass: f64,
    /// Misclassified examples seen by the latest local step.
    pub misclassified: usize,
    pub(crate) phase: PhaseMachine,
    /// Outer iterations started; the `t` of the latest local step.
    pub(crate) iteration: u32,
    /// Outer iterations whose gossip has been settled into `accumulated`.
    pub(crate) settled: u32,
    /// Gossip rounds run in the current outer iteration.
    pub(crate) gossip_rounds: u32,
    pub(crate) accumulated: WeightVector,
    pub(crate) staged: Option<PushSumBuffer>,
    pub(crate) final_model: Option<WeightVector>,
}

impl Node {
    /// Create a node owning `shard`. Mass starts at the shard size.
    pub fn new(id: NodeId, shard: Vec<TrainingExample>) -> Self {
        let mass = shard.len() as f64;
        Self {
            id,
            shard,
            weights: WeightVector::new(),
            mass,
            misclassified: 0,
            phase: PhaseMachine::new(),
            iteration: 0,
            settled: 0,
            gossip_rounds: 0,
            accumulated: WeightVector::new(),
            staged: None,
            final_model: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn shard(&self) -> &[TrainingExample] {
        &self.shard
    }

    pub fn shard_size(&self) -> usize {
        self.shard.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase.current
    }

    pub fn is_done(&self) -> bool {
        self.phase.is_done()
    }

    /// Outer iterations started so far.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Outer iterations fully completed (local step plus gossip).
    pub fn completed_iterations(&self) -> u32 {
        self.settled
    }

    /// Running sum of settled per-iteration models.
    pub fn accumulated(&self) -> &WeightVector {
        &self.accumulated
    }

    /// Staged push-sum buffer awaiting consumption, if any.
    pub fn staged(&self) -> Option<&PushSumBuffer> {
        self.staged.as_ref()
    }

    /// Averaged model published by `Finalize`.
    pub fn final_model(&self) -> Option<&WeightVector> {
        self.final_model.as_ref()
    }

    /// Push-sum estimate `w / mass`; `w` itself when mass is not positive.
    pub fn estimate(&self) -> WeightVector {
        let mut estimate = self.weights.clone();
        if self.mass > 0.0 {
            estimate.scale(1.0 / self.mass);
        }
        estimate
    }

    /// Value of `dim` as seen by the convergence observer.
    pub fn observed(&self, dim: u32, by_mass: bool) -> f64 {
        let value = self.weights.get(dim);
        if by_mass && self.mass > 0.0 {
            value / self.mass
        } else {
            value
        }
    }

    /// Start the next outer iteration and run the local sub-gradient step.
    pub(crate) fn train(&mut self, lambda: f64, decay: DecayMode) -> Result<LocalStep, GadgetError> {
        self.iteration += 1;
        self.gossip_rounds = 0;
        let step = local_update(&mut self.weights, &self.shard, self.iteration, lambda, decay)?;
        self.misclassified = step.misclassified;
        Ok(step)
    }

    /// Replace `(w, mass)` with the staged buffer. Returns false if none was staged.
    pub(crate) fn consume_staged(&mut self) -> bool {
        match self.staged.take() {
            Some(buffer) => {
                self.weights = buffer.weights;
                self.mass = buffer.mass;
                true
            }
            None => false,
        }
    }

    /// Publish `accumulated / n` as the final model, where `n` is the number
    /// of settled iterations. Falls back to the current weights when nothing
    /// was settled.
    pub(crate) fn publish_final(&mut self) {
        let model = if self.settled > 0 {
            let mut avg = self.accumulated.clone();
            avg.scale(1.0 / self.settled as f64);
            avg
        } else {
            self.weights.clone()
        };
        self.weights = model.clone();
        self.final_model = Some(model);
    }
}
