// crates/gadget-engine/src/scheduler.rs
//
// Cycle scheduler for the gossip engine.
//
// Plays the discrete-event host: every cycle it activates each alive node
// exactly once, in ascending or shuffled order, then lets the engine run the
// convergence observer. Activations never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use gadget_core::{GadgetError, NodeId, Topology};

use crate::config::GossipVariant;
use crate::engine::{CycleReport, GadgetEngine};
use crate::observer::Observation;

/// Order in which alive nodes are activated within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationOrder {
    /// Ascending node id.
    #[default]
    Sequential,
    /// A fresh seeded permutation every cycle.
    Shuffled,
}

/// Outcome of one scheduler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub variant: GossipVariant,
    pub nodes: usize,
    pub alive_nodes: usize,
    /// Cycles executed.
    pub cycles: u64,
    /// Fewest outer iterations completed by any alive node.
    pub iterations_completed: u32,
    /// Every alive node reached `Done` on its own.
    pub finished: bool,
    /// Stopped by the cancellation flag.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Observer statistics after the last cycle, if any cycle ran.
    pub final_observation: Option<Observation>,
    /// Accuracy of the averaged model on held-out data, filled in by callers
    /// that have a test set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_accuracy: Option<f64>,
}

/// Drives a `GadgetEngine` cycle by cycle.
pub struct CycleScheduler {
    order: ActivationOrder,
    max_cycles: u64,
    rng: StdRng,
    cancel: Option<Arc<AtomicBool>>,
}

impl CycleScheduler {
    /// Create a scheduler that stops after at most `max_cycles` cycles.
    pub fn new(order: ActivationOrder, max_cycles: u64, seed: u64) -> Self {
        Self {
            order,
            max_cycles,
            rng: StdRng::seed_from_u64(seed),
            cancel: None,
        }
    }

    /// Stop between cycles once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run to completion.
    pub fn run(
        &mut self,
        engine: &mut GadgetEngine,
        topology: &dyn Topology,
    ) -> Result<RunSummary, GadgetError> {
        self.run_with(engine, topology, |_| Ok(()))
    }

    /// Run to completion, handing every cycle report to `on_cycle`.
    pub fn run_with<F>(
        &mut self,
        engine: &mut GadgetEngine,
        topology: &dyn Topology,
        mut on_cycle: F,
    ) -> Result<RunSummary, GadgetError>
    where
        F: FnMut(&CycleReport) -> Result<(), GadgetError>,
    {
        engine.check_topology(topology)?;
        let started_at = Utc::now();
        let clock = Instant::now();
        let alive: Vec<NodeId> = topology
            .all_nodes()
            .into_iter()
            .filter(|&id| topology.is_alive(id))
            .collect();

        tracing::info!(
            started_at = %started_at,
            nodes = topology.size(),
            alive = alive.len(),
            order = ?self.order,
            max_cycles = self.max_cycles,
            "Simulation started"
        );
        for &id in &alive {
            if topology.alive_neighbors(id).is_empty() && topology.size() > 1 {
                tracing::warn!(node = id, "Node has no alive neighbors; it will train alone");
            }
        }

        let mut cycles = 0u64;
        let mut cancelled = false;
        let mut final_observation = None;
        while !engine.all_done(topology) {
            if self.is_cancelled() {
                tracing::warn!(cycle = cycles, "Simulation cancelled");
                cancelled = true;
                break;
            }
            if cycles >= self.max_cycles {
                tracing::warn!(
                    max_cycles = self.max_cycles,
                    "Cycle budget exhausted before every node finished"
                );
                break;
            }

            for id in self.activation_order(&alive) {
                engine.step(id, topology)?;
            }
            let report = engine.end_cycle(topology);
            tracing::trace!(
                cycle = report.cycle,
                misclassified = report.misclassified,
                max_std_dev = report.observation.max_std_dev,
                "Cycle complete"
            );
            on_cycle(&report)?;
            final_observation = Some(report.observation);
            cycles += 1;
        }

        let finished = engine.all_done(topology);
        if !finished {
            engine.force_finalize(topology)?;
        }

        let iterations_completed = alive
            .iter()
            .filter_map(|&id| engine.node(id))
            .map(|n| n.completed_iterations())
            .min()
            .unwrap_or(0);
        let elapsed_ms = clock.elapsed().as_millis() as u64;

        tracing::info!(
            cycles,
            iterations_completed,
            finished,
            elapsed_ms,
            "Simulation finished"
        );

        Ok(RunSummary {
            variant: engine.config().variant,
            nodes: topology.size(),
            alive_nodes: alive.len(),
            cycles,
            iterations_completed,
            finished,
            cancelled,
            started_at,
            elapsed_ms,
            final_observation,
            test_accuracy: None,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn activation_order(&mut self, alive: &[NodeId]) -> Vec<NodeId> {
        let mut order = alive.to_vec();
        if self.order == ActivationOrder::Shuffled {
            order.shuffle(&mut self.rng);
        }
        order
    }
}
