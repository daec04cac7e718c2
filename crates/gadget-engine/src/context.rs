// crates/gadget-engine/src/context.rs
//
// Run-scoped simulation context.
//
// Holds everything the protocol variants share during one run: the fixed
// configuration, the gossip RNG, the observer's convergence flag and the
// lazily computed mixing matrix. One context per run; nothing is global.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;

use gadget_core::{Adjacency, GadgetError, MixingMatrix, MixingOracle, Topology};

use crate::config::EngineConfig;

/// Computes the mixing matrix on first request and hands out the cached copy
/// afterwards. Concurrent first requests compute it once.
pub struct MixingCache {
    oracle: Box<dyn MixingOracle>,
    matrix: Mutex<Option<Arc<MixingMatrix>>>,
}

impl MixingCache {
    pub fn new(oracle: Box<dyn MixingOracle>) -> Self {
        Self {
            oracle,
            matrix: Mutex::new(None),
        }
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Whether the matrix has been computed.
    pub fn is_ready(&self) -> bool {
        self.matrix.lock().map(|m| m.is_some()).unwrap_or(false)
    }

    /// Return the cached matrix, computing it from `topology` if needed.
    ///
    /// A failed computation is not cached.
    pub fn get_or_compute(&self, topology: &dyn Topology) -> Result<Arc<MixingMatrix>, GadgetError> {
        let mut slot = self
            .matrix
            .lock()
            .map_err(|e| GadgetError::InvalidState(format!("mixing cache poisoned: {}", e)))?;
        if let Some(matrix) = slot.as_ref() {
            return Ok(Arc::clone(matrix));
        }

        let adjacency = Adjacency::from_topology(topology);
        if !adjacency.is_symmetric() {
            tracing::warn!("Topology is not symmetric; push-sum mass is not conserved");
        }
        let matrix = self.oracle.compute(&adjacency)?;
        matrix.ensure_size(topology.size())?;
        tracing::info!(
            oracle = self.oracle_name(),
            size = matrix.size(),
            "Mixing matrix computed"
        );

        let matrix = Arc::new(matrix);
        *slot = Some(Arc::clone(&matrix));
        Ok(matrix)
    }
}

impl std::fmt::Debug for MixingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixingCache")
            .field("oracle", &self.oracle_name())
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// State shared by every node step of one run.
#[derive(Debug)]
pub struct SimulationContext {
    pub config: EngineConfig,
    pub rng: StdRng,
    /// Set by the observer at the end of a cycle; cleared when a node starts
    /// the next outer iteration.
    pub converged: bool,
    /// Highest outer iteration any node has started.
    pub iteration: u32,
    /// Cycles completed so far.
    pub cycle: u64,
    mixing: Option<MixingCache>,
}

impl SimulationContext {
    pub fn new(config: EngineConfig, oracle: Option<Box<dyn MixingOracle>>) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            converged: false,
            iteration: 0,
            cycle: 0,
            mixing: oracle.map(MixingCache::new),
        }
    }

    /// Cached mixing matrix. Fails if no oracle was supplied or it failed.
    pub fn mixing_matrix(&self, topology: &dyn Topology) -> Result<Arc<MixingMatrix>, GadgetError> {
        match &self.mixing {
            Some(cache) => cache.get_or_compute(topology),
            None => Err(GadgetError::MixingOracle(format!(
                "variant {} needs a mixing matrix but no oracle is configured",
                self.config.variant
            ))),
        }
    }

    pub fn has_oracle(&self) -> bool {
        self.mixing.is_some()
    }
}
