// crates/gadget-engine/src/observer.rs
//
// Network-wide convergence observer.
//
// Once per cycle, for every feature dimension present on any observed node,
// computes the cross-node sample standard deviation of that dimension. A node
// that does not store a dimension contributes 0.0 for it. Gossip is considered
// converged when every dimension's deviation is within the accuracy threshold.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Running mean/variance of one dimension (Welford's method).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DimensionStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl DimensionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample in.
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (`n - 1` denominator); 0.0 for fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).max(0.0)
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Result of observing the network once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Nodes included in the statistics.
    pub nodes: usize,
    /// Distinct dimensions seen on any node.
    pub dimensions: usize,
    /// Largest per-dimension standard deviation.
    pub max_std_dev: f64,
    /// Sum of per-dimension standard deviations.
    pub sum_std_dev: f64,
    /// Every dimension within the accuracy threshold.
    pub converged: bool,
}

/// Computes cross-node agreement statistics.
#[derive(Debug, Clone)]
pub struct ConvergenceObserver {
    accuracy: f64,
    by_mass: bool,
}

impl ConvergenceObserver {
    /// `accuracy < 0` never reports convergence. With `by_mass`, each node's
    /// value is divided by its push-sum mass first.
    pub fn new(accuracy: f64, by_mass: bool) -> Self {
        Self { accuracy, by_mass }
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Observe the given nodes. Nothing is mutated.
    pub fn observe<'a, I>(&self, nodes: I) -> Observation
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let nodes: Vec<&Node> = nodes.into_iter().collect();
        let dims: BTreeSet<u32> = nodes.iter().flat_map(|n| n.weights.dims()).collect();

        let mut max_std_dev = 0.0_f64;
        let mut sum_std_dev = 0.0;
        for &dim in &dims {
            let mut stats = DimensionStats::new();
            for node in &nodes {
                stats.push(node.observed(dim, self.by_mass));
            }
            let sd = stats.std_dev();
            max_std_dev = max_std_dev.max(sd);
            sum_std_dev += sd;
        }

        let converged = self.accuracy >= 0.0 && max_std_dev <= self.accuracy;
        tracing::trace!(
            nodes = nodes.len(),
            dimensions = dims.len(),
            max_std_dev,
            converged,
            "Observed network"
        );

        Observation {
            nodes: nodes.len(),
            dimensions: dims.len(),
            max_std_dev,
            sum_std_dev,
            converged,
        }
    }
}
