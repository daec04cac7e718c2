// crates/gadget-sim/src/main.rs
//
// Binary entrypoint for the GADGET simulator.
//
// Parses CLI arguments, loads configuration, initializes tracing, reads and
// partitions the training data, builds the topology and engine, then runs the
// cycle scheduler on a blocking thread until every node finishes, the cycle
// budget runs out, or Ctrl-C is received.

mod config;
mod diagnostics;
mod output;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use config::SimConfig;
use diagnostics::DiagnosticsWriter;
use output::{NodeModel, OutputFormat, RunReport};

use gadget_core::{
    load_svmlight, parse_svmlight, partition, slice_lines, GadgetError, Topology, TrainingExample,
};
use gadget_engine::{evaluate, CycleScheduler, GadgetEngine, GossipVariant};

/// GADGET simulator: gossip-based distributed linear SVM training.
#[derive(Parser, Debug)]
#[command(
    name = "gadget-sim",
    version = "0.1.0",
    about = "Simulate gossip-based distributed SVM training over a peer network"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "gadget.toml")]
    config: String,

    /// Gossip variant: uniform-pairwise, matrix-weighted, pushsum-single-phase, pushsum-two-phase.
    #[arg(long)]
    variant: Option<GossipVariant>,

    /// SVM regularisation parameter (> 0).
    #[arg(long)]
    lambda: Option<f64>,

    /// Outer iteration budget.
    #[arg(long)]
    iterations: Option<u32>,

    /// Convergence threshold; negative disables early exit.
    #[arg(long, allow_hyphen_values = true)]
    accuracy: Option<f64>,

    /// Number of simulated nodes.
    #[arg(long)]
    nodes: Option<usize>,

    /// SVMlight training file.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Seed for gossip, topology and activation order.
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: table or json.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Write per-cycle diagnostics (JSON Lines) to this file.
    #[arg(long)]
    diagnostics: Option<PathBuf>,
}

impl Args {
    /// CLI flags override the config file.
    fn apply(&self, config: &mut SimConfig) {
        if let Some(variant) = self.variant {
            config.engine.variant = variant;
        }
        if let Some(lambda) = self.lambda {
            config.engine.lambda = lambda;
        }
        if let Some(iterations) = self.iterations {
            config.engine.iterations = iterations;
        }
        if let Some(accuracy) = self.accuracy {
            config.engine.accuracy = accuracy;
        }
        if let Some(nodes) = self.nodes {
            config.network.nodes = nodes;
        }
        if let Some(data) = &self.data {
            config.data.train = Some(data.clone());
        }
        if let Some(seed) = self.seed {
            config.engine.seed = seed;
            config.network.seed = seed;
            config.run.seed = seed;
        }
        if let Some(format) = self.format {
            config.run.format = format;
        }
        if let Some(path) = &self.diagnostics {
            config.run.diagnostics = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found. Logged once tracing is up.
    let loaded = SimConfig::load(&args.config);
    let log_level = loaded
        .as_ref()
        .map(|cfg| cfg.run.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut sim_config = match loaded {
        Ok(cfg) => {
            tracing::info!("Loaded configuration from {}", args.config);
            cfg
        }
        Err(e) => {
            tracing::warn!("{}. Using defaults.", e);
            SimConfig::default()
        }
    };
    args.apply(&mut sim_config);
    sim_config.validate()?;

    tracing::info!("GADGET simulator v0.1.0");
    tracing::info!("Variant: {}", sim_config.engine.variant);
    tracing::info!(
        "lambda={} T={} accuracy={} max_gossip_rounds={}",
        sim_config.engine.lambda,
        sim_config.engine.iterations,
        sim_config.engine.accuracy,
        sim_config.engine.max_gossip_rounds
    );

    // ---------------------------------------------------------------
    // Data
    // ---------------------------------------------------------------
    let examples = load_training_data(&sim_config)?;
    tracing::info!(
        "Loaded {} training examples across {} nodes",
        examples.len(),
        sim_config.network.nodes
    );
    let test_set = match &sim_config.data.test {
        Some(path) => Some(load_svmlight(path)?),
        None => None,
    };
    let shards = partition(examples, sim_config.network.nodes, sim_config.data.partition)?;

    // ---------------------------------------------------------------
    // Network
    // ---------------------------------------------------------------
    let mut graph = sim_config
        .network
        .topology
        .build(sim_config.network.nodes, sim_config.network.seed)?;
    for &dead in &sim_config.network.dead {
        graph.set_alive(dead, false)?;
    }
    tracing::info!(
        "Topology {:?}: {} links, connected={}",
        sim_config.network.topology,
        graph.edge_count(),
        graph.is_connected()
    );

    let oracle = if sim_config.engine.variant.needs_mixing_matrix() {
        Some(sim_config.mixing.clone().into_oracle())
    } else {
        None
    };
    let mut engine = GadgetEngine::new(sim_config.engine.clone(), shards, oracle)?;

    // ---------------------------------------------------------------
    // Run
    // ---------------------------------------------------------------
    let cancel = Arc::new(AtomicBool::new(false));
    let mut scheduler = CycleScheduler::new(
        sim_config.run.order,
        sim_config.run.max_cycles,
        sim_config.run.seed,
    )
    .with_cancellation(Arc::clone(&cancel));
    let mut diagnostics = match &sim_config.run.diagnostics {
        Some(path) => Some(DiagnosticsWriter::create(path)?),
        None => None,
    };

    let mut task = tokio::task::spawn_blocking(move || {
        let summary = scheduler.run_with(&mut engine, &graph, |report| match diagnostics.as_mut() {
            Some(writer) => writer.record(report),
            None => Ok(()),
        })?;
        if let Some(writer) = diagnostics {
            let records = writer.finish()?;
            tracing::debug!(records, "Diagnostics flushed");
        }
        Ok::<_, GadgetError>((engine, graph, summary))
    });

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Shutdown signal received; stopping after the current cycle");
            cancel.store(true, Ordering::SeqCst);
            task.await
        }
    };
    let (engine, graph, mut summary) = joined??;

    // ---------------------------------------------------------------
    // Report
    // ---------------------------------------------------------------
    let models = collect_models(&engine, &graph, test_set.as_deref());
    let scored: Vec<f64> = models.iter().filter_map(|m| m.test_accuracy).collect();
    if !scored.is_empty() {
        summary.test_accuracy = Some(scored.iter().sum::<f64>() / scored.len() as f64);
    }

    let report = RunReport { summary, models };
    println!("{}", output::render(&report, sim_config.run.format));

    Ok(())
}

/// Read the configured training file, optionally cut to a line range.
fn load_training_data(config: &SimConfig) -> Result<Vec<TrainingExample>, GadgetError> {
    let path = config.data.train.as_ref().ok_or_else(|| {
        GadgetError::InvalidConfig("no training data configured (set [data] train or --data)".to_string())
    })?;

    match (config.data.start_line, config.data.end_line) {
        (None, None) => load_svmlight(path),
        (start, end) => {
            let text = fs::read_to_string(path)
                .map_err(|e| GadgetError::Dataset(format!("{}: {}", path.display(), e)))?;
            let lines = slice_lines(&text, start.unwrap_or(1), end.unwrap_or(usize::MAX));
            parse_svmlight(&lines.join("\n"))
        }
    }
}

/// Final model and diagnostics for every alive node.
fn collect_models(
    engine: &GadgetEngine,
    topology: &dyn Topology,
    test_set: Option<&[TrainingExample]>,
) -> Vec<NodeModel> {
    engine
        .nodes()
        .iter()
        .filter(|n| topology.is_alive(n.id()))
        .map(|n| {
            let weights = n.final_model().cloned().unwrap_or_else(|| n.weights.clone());
            NodeModel {
                node: n.id(),
                iterations: n.completed_iterations(),
                misclassified: n.misclassified,
                shard_size: n.shard_size(),
                test_accuracy: test_set.map(|examples| evaluate(&weights, examples).accuracy),
                weights,
            }
        })
        .collect()
}
