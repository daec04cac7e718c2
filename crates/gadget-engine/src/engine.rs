// crates/gadget-engine/src/engine.rs
//
// The gossip learning engine: one type for every gossip variant.
//
// Each call to `step` advances exactly one node by one phase. The caller
// (normally `CycleScheduler`) steps every alive node once, then calls
// `end_cycle`, which runs the convergence observer.
//
// Per outer iteration a node goes through:
//   LocalUpdate  - sub-gradient step (projected at once for single-phase variants)
//   GossipWait   - one gossip round per activation until the observer has
//                  converged or the round budget is spent, then project and
//                  settle the iteration into the accumulated model
//   Finalize     - after T iterations, publish accumulated / T

use serde::{Deserialize, Serialize};

use gadget_core::{GadgetError, MixingOracle, NodeId, Topology, TrainingExample, WeightVector};

use crate::config::{EngineConfig, GossipVariant, WriteBack};
use crate::context::SimulationContext;
use crate::gossip;
use crate::node::Node;
use crate::observer::{ConvergenceObserver, Observation};
use crate::phase::Phase;
use crate::projection::project;

/// Per-cycle diagnostics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Zero-based cycle number.
    pub cycle: u64,
    /// Sum of the latest misclassified counts over observed nodes.
    pub misclassified: usize,
    /// Sum of push-sum mass over observed nodes.
    pub total_mass: f64,
    /// Nodes that have reached `Done`.
    pub done: usize,
    pub observation: Observation,
}

/// Gossip-based distributed SVM engine.
#[derive(Debug)]
pub struct GadgetEngine {
    ctx: SimulationContext,
    nodes: Vec<Node>,
    observer: ConvergenceObserver,
}

impl GadgetEngine {
    /// Build an engine with one node per shard.
    ///
    /// Variants that need a mixing matrix require `oracle`; the matrix itself
    /// is computed on the first gossip round that asks for it.
    pub fn new(
        config: EngineConfig,
        shards: Vec<Vec<TrainingExample>>,
        oracle: Option<Box<dyn MixingOracle>>,
    ) -> Result<Self, GadgetError> {
        config.validate()?;
        if config.variant.needs_mixing_matrix() && oracle.is_none() {
            return Err(GadgetError::InvalidConfig(format!(
                "variant {} requires a mixing-matrix oracle",
                config.variant
            )));
        }

        let nodes: Vec<Node> = shards
            .into_iter()
            .enumerate()
            .map(|(id, shard)| Node::new(id, shard))
            .collect();
        let observer = ConvergenceObserver::new(config.accuracy, config.variant.tracks_mass());

        tracing::info!(
            nodes = nodes.len(),
            variant = %config.variant,
            lambda = config.lambda,
            iterations = config.iterations,
            accuracy = config.accuracy,
            "Engine initialised"
        );

        Ok(Self {
            ctx: SimulationContext::new(config, oracle),
            nodes,
            observer,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Fail unless `topology` describes exactly this engine's nodes.
    pub fn check_topology(&self, topology: &dyn Topology) -> Result<(), GadgetError> {
        if topology.size() != self.nodes.len() {
            return Err(GadgetError::Topology(format!(
                "topology has {} nodes but the engine has {}",
                topology.size(),
                self.nodes.len()
            )));
        }
        Ok(())
    }

    /// Advance node `id` by one phase.
    pub fn step(&mut self, id: NodeId, topology: &dyn Topology) -> Result<(), GadgetError> {
        let phase = self
            .nodes
            .get(id)
            .map(Node::phase)
            .ok_or_else(|| GadgetError::NotFound(format!("node {}", id)))?;

        match phase {
            Phase::LocalUpdate => self.local_phase(id),
            Phase::GossipWait => self.gossip_phase(id, topology),
            Phase::Finalize => self.finalize_phase(id),
            Phase::Done => Ok(()),
        }
    }

    fn local_phase(&mut self, id: NodeId) -> Result<(), GadgetError> {
        let lambda = self.ctx.config.lambda;
        let variant = self.ctx.config.variant;

        let node = &mut self.nodes[id];
        let step = node.train(lambda, self.ctx.config.decay)?;
        if variant == GossipVariant::PushsumTwoPhase {
            // Publish the shard-weighted value; an empty shard carries no mass.
            if node.shard_size() == 0 {
                node.weights.clear();
                node.mass = 0.0;
            } else {
                node.mass = node.shard_size() as f64;
            }
        } else {
            project(&mut node.weights, lambda, self.ctx.config.projection);
        }
        tracing::trace!(
            node = id,
            t = node.iteration,
            alpha = step.alpha,
            violators = step.violators,
            misclassified = step.misclassified,
            "Local update"
        );

        let t = node.iteration;
        node.phase.transition(Phase::GossipWait)?;
        if t > self.ctx.iteration {
            // First node into a new outer iteration clears the flag.
            self.ctx.converged = false;
            self.ctx.iteration = t;
            tracing::info!(iteration = t, cycle = self.ctx.cycle, "Outer iteration started");
        }
        Ok(())
    }

    fn gossip_phase(&mut self, id: NodeId, topology: &dyn Topology) -> Result<(), GadgetError> {
        let config = &self.ctx.config;
        let variant = config.variant;

        if variant == GossipVariant::PushsumTwoPhase && gossip::pushsum_receive(&mut self.nodes[id]) {
            return Ok(());
        }

        if self.ctx.converged || self.nodes[id].gossip_rounds >= config.max_gossip_rounds {
            return self.settle(id);
        }

        match variant {
            GossipVariant::UniformPairwise => {
                let peer = gossip::uniform_pairwise(
                    &mut self.nodes,
                    id,
                    topology,
                    &mut self.ctx.rng,
                    config.write_back,
                );
                // The pairwise sum is unnormalized; scale it back into the ball.
                project(&mut self.nodes[id].weights, config.lambda, config.projection);
                if let (Some(peer), WriteBack::Symmetric) = (peer, config.write_back) {
                    project(&mut self.nodes[peer].weights, config.lambda, config.projection);
                }
                self.log_partner(id, peer);
            }
            GossipVariant::PushsumSinglePhase => {
                let peer =
                    gossip::pushsum_single_phase(&mut self.nodes, id, topology, &mut self.ctx.rng);
                self.log_partner(id, peer);
            }
            GossipVariant::MatrixWeighted => {
                let matrix = self.ctx.mixing_matrix(topology)?;
                gossip::matrix_weighted(&mut self.nodes, id, topology, &matrix);
            }
            GossipVariant::PushsumTwoPhase => {
                let matrix = self.ctx.mixing_matrix(topology)?;
                gossip::pushsum_send(&mut self.nodes, id, topology, &matrix);
            }
        }
        self.nodes[id].gossip_rounds += 1;
        Ok(())
    }

    fn log_partner(&self, id: NodeId, peer: Option<NodeId>) {
        match peer {
            Some(peer) => tracing::debug!(node = id, peer, "Gossip partner chosen"),
            None => tracing::debug!(node = id, "No alive neighbor; gossip skipped"),
        }
    }

    /// Close the node's current outer iteration and pick the next phase.
    fn settle(&mut self, id: NodeId) -> Result<(), GadgetError> {
        let lambda = self.ctx.config.lambda;
        let projection = self.ctx.config.projection;
        let iterations = self.ctx.config.iterations;
        let variant = self.ctx.config.variant;

        let node = &mut self.nodes[id];
        if variant == GossipVariant::PushsumTwoPhase {
            let mut estimate = node.estimate();
            project(&mut estimate, lambda, projection);
            node.accumulated.add_scaled(&estimate, 1.0);
            node.weights = estimate;
            node.mass = 1.0;
        } else {
            project(&mut node.weights, lambda, projection);
            node.accumulated.add_scaled(&node.weights, 1.0);
        }
        node.settled += 1;

        let next = if node.iteration >= iterations {
            Phase::Finalize
        } else {
            Phase::LocalUpdate
        };
        tracing::debug!(
            node = id,
            iteration = node.iteration,
            rounds = node.gossip_rounds,
            next = %next,
            "Gossip settled"
        );
        node.phase.transition(next)
    }

    fn finalize_phase(&mut self, id: NodeId) -> Result<(), GadgetError> {
        let node = &mut self.nodes[id];
        node.publish_final();
        node.phase.transition(Phase::Done)?;
        tracing::debug!(node = id, iterations = node.settled, "Node finalised");
        Ok(())
    }

    /// Run the observer over alive nodes and update the convergence flag.
    pub fn end_cycle(&mut self, topology: &dyn Topology) -> CycleReport {
        let alive: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|n| topology.is_alive(n.id()))
            .collect();
        let observation = self.observer.observe(alive.iter().copied());
        let report = CycleReport {
            cycle: self.ctx.cycle,
            misclassified: alive.iter().map(|n| n.misclassified).sum(),
            total_mass: alive.iter().map(|n| n.mass).sum(),
            done: alive.iter().filter(|n| n.is_done()).count(),
            observation,
        };

        if report.observation.converged && !self.ctx.converged {
            tracing::info!(
                cycle = self.ctx.cycle,
                max_std_dev = report.observation.max_std_dev,
                "Gossip converged"
            );
        }
        self.ctx.converged = report.observation.converged;
        self.ctx.cycle += 1;
        report
    }

    /// True when every alive node has reached `Done`.
    pub fn all_done(&self, topology: &dyn Topology) -> bool {
        self.nodes
            .iter()
            .filter(|n| topology.is_alive(n.id()))
            .all(Node::is_done)
    }

    /// Finish every alive node that is still running from whatever it has
    /// settled so far.
    pub fn force_finalize(&mut self, topology: &dyn Topology) -> Result<usize, GadgetError> {
        let mut forced = 0;
        for node in self.nodes.iter_mut() {
            if !topology.is_alive(node.id()) || node.is_done() {
                continue;
            }
            if node.phase() != Phase::Finalize {
                node.phase.transition(Phase::Finalize)?;
            }
            node.staged = None;
            node.publish_final();
            node.phase.transition(Phase::Done)?;
            forced += 1;
        }
        if forced > 0 {
            tracing::warn!(forced, "Nodes force-finalised before completing all iterations");
        }
        Ok(forced)
    }

    /// Final models of finished nodes, by node id.
    pub fn final_models(&self) -> Vec<(NodeId, WeightVector)> {
        self.nodes
            .iter()
            .filter_map(|n| n.final_model().map(|w| (n.id(), w.clone())))
            .collect()
    }
}
