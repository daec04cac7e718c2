// crates/gadget-sim/src/config.rs
//
// Runtime configuration for the simulator.
// Loaded from a TOML file; every section and field has a default, so a partial
// file (or no file at all) is valid.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use gadget_core::{GadgetError, NodeId, PartitionStrategy};
use gadget_engine::{ActivationOrder, EngineConfig};
use gadget_topology::{OracleKind, TopologyKind};

use crate::output::OutputFormat;

/// Failure to obtain a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Full simulator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    /// Mixing-matrix oracle, e.g. `oracle = "sinkhorn"`.
    #[serde(default)]
    pub mixing: OracleKind,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub run: RunConfig,
}

/// Simulated network shape.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Number of nodes; one data shard each.
    #[serde(default = "default_nodes")]
    pub nodes: usize,

    /// Graph shape, e.g. `[network.topology] kind = "random-out"`.
    #[serde(default)]
    pub topology: TopologyKind,

    /// Seed for random graph shapes.
    #[serde(default)]
    pub seed: u64,

    /// Nodes marked dead before the run starts.
    #[serde(default)]
    pub dead: Vec<NodeId>,
}

fn default_nodes() -> usize {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            topology: TopologyKind::default(),
            seed: 0,
            dead: Vec::new(),
        }
    }
}

/// Training and evaluation data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    /// SVMlight training file.
    #[serde(default)]
    pub train: Option<PathBuf>,

    /// Optional SVMlight file used to score the final models.
    #[serde(default)]
    pub test: Option<PathBuf>,

    #[serde(default)]
    pub partition: PartitionStrategy,

    /// First training line to use (1-based, inclusive).
    #[serde(default)]
    pub start_line: Option<usize>,

    /// Last training line to use (1-based, inclusive).
    #[serde(default)]
    pub end_line: Option<usize>,
}

/// Scheduler and reporting options.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Hard cap on scheduler cycles.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,

    #[serde(default)]
    pub order: ActivationOrder,

    /// Seed for shuffled activation order.
    #[serde(default)]
    pub seed: u64,

    /// JSON Lines file receiving one record per cycle.
    #[serde(default)]
    pub diagnostics: Option<PathBuf>,

    #[serde(default)]
    pub format: OutputFormat,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_cycles() -> u64 {
    100_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            order: ActivationOrder::default(),
            seed: 0,
            diagnostics: None,
            format: OutputFormat::default(),
            log_level: default_log_level(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Check cross-field constraints once, before anything is built.
    pub fn validate(&self) -> Result<(), GadgetError> {
        self.engine.validate()?;
        if self.network.nodes < 1 {
            return Err(GadgetError::InvalidConfig(
                "network needs at least one node".to_string(),
            ));
        }
        if let Some(&bad) = self.network.dead.iter().find(|&&id| id >= self.network.nodes) {
            return Err(GadgetError::InvalidConfig(format!(
                "dead node {} out of range for {} nodes",
                bad, self.network.nodes
            )));
        }
        if let (Some(start), Some(end)) = (self.data.start_line, self.data.end_line) {
            if start > end {
                return Err(GadgetError::InvalidConfig(format!(
                    "start_line {} is after end_line {}",
                    start, end
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gadget_engine::GossipVariant;

    #[test]
    fn empty_file_gives_defaults() {
        let config: SimConfig = toml::from_str("").unwrap();
        assert_eq!(config.network.nodes, 10);
        assert_eq!(config.run.max_cycles, 100_000);
        assert_eq!(config.mixing, OracleKind::MetropolisHastings);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_file_parses() {
        let text = r#"
            [engine]
            lambda = 0.05
            iterations = 20
            accuracy = 0.001
            variant = "matrix-weighted"
            projection = "legacy-offset"

            [network]
            nodes = 6
            seed = 3
            dead = [5]

            [network.topology]
            kind = "random-out"
            degree = 2

            [mixing]
            oracle = "sinkhorn"
            tolerance = 1e-6

            [data]
            train = "train.svm"
            partition = "round-robin"
            start_line = 1
            end_line = 100

            [run]
            order = "shuffled"
            format = "json"
            log_level = "debug"
        "#;
        let config: SimConfig = toml::from_str(text).unwrap();
        assert_eq!(config.engine.variant, GossipVariant::MatrixWeighted);
        assert_eq!(config.engine.max_gossip_rounds, 20);
        assert_eq!(config.network.topology, TopologyKind::RandomOut { degree: 2 });
        assert!(matches!(
            config.mixing,
            OracleKind::Sinkhorn { max_iterations: 1000, .. }
        ));
        assert_eq!(config.data.partition, PartitionStrategy::RoundRobin);
        assert_eq!(config.run.order, ActivationOrder::Shuffled);
        assert_eq!(config.run.format, OutputFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn dead_node_out_of_range_rejected() {
        let mut config = SimConfig::default();
        config.network.nodes = 3;
        config.network.dead = vec![3];
        assert!(matches!(
            config.validate(),
            Err(GadgetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = SimConfig::load("/nonexistent/gadget.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
