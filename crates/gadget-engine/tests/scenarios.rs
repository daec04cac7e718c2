// crates/gadget-engine/tests/scenarios.rs
//
// End-to-end scenarios for the gossip engine.
//
// These drive the engine, topology and scheduler together through public
// APIs only: agreement after pairwise gossip, fixed-budget runs, isolated
// nodes, push-sum mass conservation, the norm bound and early convergence.

use gadget_core::{
    partition, GadgetError, Label, MixingOracle, PartitionStrategy, Topology, TrainingExample,
    WeightVector,
};
use gadget_engine::{
    evaluate, gossip, local_update, project, ActivationOrder, ConvergenceObserver, CycleScheduler,
    DecayMode, EngineConfig, GadgetEngine, GossipVariant, Node, Phase, ProjectionMode, WriteBack,
};
use gadget_topology::{Graph, MaxDegree, MetropolisHastings};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn positive(features: Vec<(u32, f64)>) -> TrainingExample {
    TrainingExample::new(Label::Positive, features)
}

fn negative(features: Vec<(u32, f64)>) -> TrainingExample {
    TrainingExample::new(Label::Negative, features)
}

/// Separable set: positives live on dimension 0, negatives on dimension 1.
fn separable(n: usize) -> Vec<TrainingExample> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                positive(vec![(0, 1.0), (2, 0.5)])
            } else {
                negative(vec![(1, 1.0), (2, 0.5)])
            }
        })
        .collect()
}

fn config(variant: GossipVariant, iterations: u32, rounds: u32, accuracy: f64) -> EngineConfig {
    EngineConfig {
        lambda: 0.1,
        iterations,
        accuracy,
        variant,
        max_gossip_rounds: rounds,
        seed: 42,
        ..Default::default()
    }
}

fn oracle_for(variant: GossipVariant) -> Option<Box<dyn MixingOracle>> {
    if variant.needs_mixing_matrix() {
        Some(Box::new(MetropolisHastings))
    } else {
        None
    }
}

fn step_cycle(engine: &mut GadgetEngine, topology: &dyn Topology) -> gadget_engine::CycleReport {
    for id in 0..topology.size() {
        if topology.is_alive(id) {
            engine.step(id, topology).unwrap();
        }
    }
    engine.end_cycle(topology)
}

// ---------------------------------------------------------------------------
// Pairwise agreement
// ---------------------------------------------------------------------------

#[test]
fn two_nodes_agree_after_symmetric_pairwise_round() {
    let shards = vec![vec![positive(vec![(0, 1.0)])], vec![negative(vec![(0, 1.0)])]];
    let mut cfg = config(GossipVariant::UniformPairwise, 5, 5, -1.0);
    cfg.write_back = WriteBack::Symmetric;
    let mut engine = GadgetEngine::new(cfg, shards, None).unwrap();
    let g = Graph::complete(2);

    // Local update on both nodes.
    step_cycle(&mut engine, &g);
    let before = engine.node(0).unwrap().weights.get(0) - engine.node(1).unwrap().weights.get(0);
    assert!(before.abs() > 1.0, "local models should disagree first");

    // One gossip round initiated by node 0.
    engine.step(0, &g).unwrap();
    let w0 = engine.node(0).unwrap().weights.get(0);
    let w1 = engine.node(1).unwrap().weights.get(0);
    assert!(
        (w0 - w1).abs() < 1e-9,
        "dimension 0 should match after symmetric write-back: {} vs {}",
        w0,
        w1
    );
}

// ---------------------------------------------------------------------------
// Fixed iteration budget
// ---------------------------------------------------------------------------

#[test]
fn negative_accuracy_runs_exactly_t_iterations() {
    let t = 4;
    let rounds = 3;
    for variant in [
        GossipVariant::UniformPairwise,
        GossipVariant::MatrixWeighted,
        GossipVariant::PushsumSinglePhase,
        GossipVariant::PushsumTwoPhase,
    ] {
        let shards = partition(separable(12), 4, PartitionStrategy::RoundRobin).unwrap();
        let mut engine =
            GadgetEngine::new(config(variant, t, rounds, -1.0), shards, oracle_for(variant))
                .unwrap();
        let g = Graph::ring(4);
        let mut converged_cycles = 0;
        let summary = CycleScheduler::new(ActivationOrder::Sequential, 10_000, 3)
            .run_with(&mut engine, &g, |report| {
                if report.observation.converged {
                    converged_cycles += 1;
                }
                Ok(())
            })
            .unwrap();

        assert!(summary.finished, "{} should finish", variant);
        assert_eq!(converged_cycles, 0, "{} must never converge", variant);
        for node in engine.nodes() {
            assert_eq!(node.iteration(), t, "{}: local updates", variant);
            assert_eq!(node.completed_iterations(), t);
            assert_eq!(node.phase(), Phase::Done);
        }

        let rounds_cycles = if variant == GossipVariant::PushsumTwoPhase {
            2 * rounds
        } else {
            rounds
        };
        assert_eq!(
            summary.cycles,
            u64::from(t * (rounds_cycles + 2) + 1),
            "{}: unexpected cycle count",
            variant
        );
    }
}

// ---------------------------------------------------------------------------
// Isolated nodes
// ---------------------------------------------------------------------------

fn isolated_shard() -> Vec<TrainingExample> {
    vec![
        positive(vec![(0, 1.0), (1, 0.5)]),
        negative(vec![(1, 1.0), (2, 1.0)]),
        positive(vec![(0, 0.2), (2, -0.4)]),
    ]
}

#[test]
fn isolated_node_single_iteration_keeps_local_projected_model() {
    let lambda = 0.1;
    let mut cfg = config(GossipVariant::PushsumSinglePhase, 1, 4, -1.0);
    cfg.lambda = lambda;
    let mut engine = GadgetEngine::new(cfg, vec![isolated_shard()], None).unwrap();
    let g = Graph::isolated(1);
    let summary = CycleScheduler::new(ActivationOrder::Sequential, 100, 0)
        .run(&mut engine, &g)
        .unwrap();
    assert!(summary.finished);

    let mut expected = WeightVector::new();
    local_update(&mut expected, &isolated_shard(), 1, lambda, DecayMode::ShardScaled).unwrap();
    project(&mut expected, lambda, ProjectionMode::NormBall);

    let model = engine.node(0).unwrap().final_model().unwrap();
    assert!(
        model.max_abs_diff(&expected) < 1e-12,
        "gossip must be a no-op for an isolated node"
    );
}

#[test]
fn isolated_node_multi_iteration_matches_manual_replay() {
    let lambda = 0.5;
    let t = 3;

    // Single-phase: project after every local step, accumulate, average.
    let mut cfg = config(GossipVariant::UniformPairwise, t, 2, -1.0);
    cfg.lambda = lambda;
    let mut engine = GadgetEngine::new(cfg, vec![isolated_shard()], None).unwrap();
    let g = Graph::isolated(1);
    CycleScheduler::new(ActivationOrder::Sequential, 1_000, 0)
        .run(&mut engine, &g)
        .unwrap();

    let mut w = WeightVector::new();
    let mut acc = WeightVector::new();
    for step in 1..=t {
        local_update(&mut w, &isolated_shard(), step, lambda, DecayMode::ShardScaled).unwrap();
        project(&mut w, lambda, ProjectionMode::NormBall);
        acc.add_scaled(&w, 1.0);
    }
    acc.scale(1.0 / t as f64);
    let model = engine.node(0).unwrap().final_model().unwrap();
    assert!(model.max_abs_diff(&acc) < 1e-12);

    // Two-phase: the push-sum estimate of a lone node is w / N.
    let mut cfg = config(GossipVariant::PushsumTwoPhase, t, 2, -1.0);
    cfg.lambda = lambda;
    let mut engine =
        GadgetEngine::new(cfg, vec![isolated_shard()], Some(Box::new(MetropolisHastings)))
            .unwrap();
    CycleScheduler::new(ActivationOrder::Sequential, 1_000, 0)
        .run(&mut engine, &g)
        .unwrap();

    let n = isolated_shard().len() as f64;
    let mut w = WeightVector::new();
    let mut acc = WeightVector::new();
    for step in 1..=t {
        local_update(&mut w, &isolated_shard(), step, lambda, DecayMode::ShardScaled).unwrap();
        w.scale(1.0 / n);
        project(&mut w, lambda, ProjectionMode::NormBall);
        acc.add_scaled(&w, 1.0);
    }
    acc.scale(1.0 / t as f64);
    let model = engine.node(0).unwrap().final_model().unwrap();
    assert!(
        model.max_abs_diff(&acc) < 1e-9,
        "two-phase replay mismatch: {:?} vs {:?}",
        model,
        acc
    );
}

#[test]
fn node_with_only_dead_neighbors_still_trains() {
    let shards = partition(separable(6), 3, PartitionStrategy::RoundRobin).unwrap();
    let mut engine = GadgetEngine::new(
        config(GossipVariant::MatrixWeighted, 2, 2, -1.0),
        shards,
        Some(Box::new(MaxDegree)),
    )
    .unwrap();
    let mut g = Graph::star(3);
    g.set_alive(0, false).unwrap();

    let summary = CycleScheduler::new(ActivationOrder::Sequential, 1_000, 0)
        .run(&mut engine, &g)
        .unwrap();
    assert!(summary.finished);
    assert_eq!(summary.alive_nodes, 2);
    assert!(engine.node(1).unwrap().final_model().is_some());
    assert!(engine.node(0).unwrap().final_model().is_none());
}

// ---------------------------------------------------------------------------
// Push-sum mass
// ---------------------------------------------------------------------------

#[test]
fn two_phase_gossip_conserves_mass() {
    let shards = partition(separable(15), 5, PartitionStrategy::Contiguous).unwrap();
    let rounds = 6;
    let mut engine = GadgetEngine::new(
        config(GossipVariant::PushsumTwoPhase, 2, rounds, -1.0),
        shards,
        Some(Box::new(MetropolisHastings)),
    )
    .unwrap();
    let g = Graph::ring(5);

    let after_local = step_cycle(&mut engine, &g);
    assert!((after_local.total_mass - 15.0).abs() < 1e-12);

    for cycle in 0..(2 * rounds) {
        let report = step_cycle(&mut engine, &g);
        assert!(
            (report.total_mass - after_local.total_mass).abs() < 1e-9,
            "gossip cycle {} changed total mass to {}",
            cycle,
            report.total_mass
        );
    }
}

#[test]
fn two_phase_mass_survives_shuffled_activation_and_dead_node() {
    let shards = partition(separable(12), 4, PartitionStrategy::RoundRobin).unwrap();
    let mut engine = GadgetEngine::new(
        config(GossipVariant::PushsumTwoPhase, 1, 5, -1.0),
        shards,
        Some(Box::new(MetropolisHastings)),
    )
    .unwrap();
    let mut g = Graph::complete(4);
    g.set_alive(3, false).unwrap();

    let mut masses = Vec::new();
    CycleScheduler::new(ActivationOrder::Shuffled, 1_000, 17)
        .run_with(&mut engine, &g, |report| {
            masses.push(report.total_mass);
            Ok(())
        })
        .unwrap();

    // Cycle 0 is the local update; the next ten cycles are send/receive pairs.
    let alive_mass = masses[0];
    assert!((alive_mass - 9.0).abs() < 1e-12);
    for (cycle, mass) in masses.iter().enumerate().take(11).skip(1) {
        assert!(
            (mass - alive_mass).abs() < 1e-9,
            "cycle {}: mass {} != {}",
            cycle,
            mass,
            alive_mass
        );
    }
}

// ---------------------------------------------------------------------------
// Convergence
// ---------------------------------------------------------------------------

#[test]
fn matrix_gossip_never_increases_spread() {
    let g = Graph::ring(6);
    let matrix = MetropolisHastings
        .compute(&gadget_core::Adjacency::from_topology(&g))
        .unwrap();
    let mut nodes: Vec<Node> = [6.0, 0.0, 3.0, -2.0, 5.0, 1.0]
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let mut node = Node::new(i, Vec::new());
            node.weights = WeightVector::from_pairs([(0, v)]);
            node
        })
        .collect();

    let observer = ConvergenceObserver::new(1e-6, false);
    let mut previous = observer.observe(&nodes).max_std_dev;
    for sweep in 0..30 {
        for id in 0..nodes.len() {
            gossip::matrix_weighted(&mut nodes, id, &g, &matrix);
        }
        let current = observer.observe(&nodes).max_std_dev;
        assert!(
            current <= previous + 1e-12,
            "sweep {}: spread grew from {} to {}",
            sweep,
            previous,
            current
        );
        previous = current;
    }
    assert!(observer.observe(&nodes).converged);
}

#[test]
fn complete_graph_two_phase_reaches_agreement_early() {
    let shards = partition(separable(16), 4, PartitionStrategy::RoundRobin).unwrap();
    let t = 5;
    let rounds = 10;
    let mut engine = GadgetEngine::new(
        config(GossipVariant::PushsumTwoPhase, t, rounds, 1e-9),
        shards,
        Some(Box::new(MetropolisHastings)),
    )
    .unwrap();
    let g = Graph::complete(4);
    let summary = CycleScheduler::new(ActivationOrder::Sequential, 10_000, 0)
        .run(&mut engine, &g)
        .unwrap();

    assert!(summary.finished);
    assert!(
        summary.cycles < u64::from(t * (2 * rounds + 2) + 1),
        "convergence should cut gossip short, ran {} cycles",
        summary.cycles
    );

    let models = engine.final_models();
    assert_eq!(models.len(), 4);
    for (_, model) in &models[1..] {
        assert!(models[0].1.max_abs_diff(model) < 1e-9);
    }

    // Positives sit on dimension 0 and negatives on dimension 1.
    let report = evaluate(&models[0].1, &separable(16));
    assert_eq!(report.errors, 0);
    assert_eq!(report.accuracy, 1.0);
}

#[test]
fn norm_bound_holds_for_every_variant() {
    let lambda: f64 = 0.05;
    let bound = 1.0 / lambda.sqrt() + 1e-9;
    for variant in [
        GossipVariant::UniformPairwise,
        GossipVariant::MatrixWeighted,
        GossipVariant::PushsumSinglePhase,
        GossipVariant::PushsumTwoPhase,
    ] {
        let shards = partition(separable(20), 5, PartitionStrategy::RoundRobin).unwrap();
        let mut cfg = config(variant, 6, 20, -1.0);
        cfg.lambda = lambda;
        cfg.projection = ProjectionMode::NormBall;
        let mut engine = GadgetEngine::new(cfg, shards, oracle_for(variant)).unwrap();
        let g = Graph::random_out(5, 2, 3).unwrap();

        // Two-phase values carry mass and are only bounded once settled.
        while !engine.all_done(&g) {
            step_cycle(&mut engine, &g);
            if variant == GossipVariant::PushsumTwoPhase {
                continue;
            }
            for node in engine.nodes() {
                assert!(
                    node.weights.l2_norm() <= bound,
                    "{}: node {} norm {} exceeds {} after gossip",
                    variant,
                    node.id(),
                    node.weights.l2_norm(),
                    bound
                );
            }
        }

        let models = engine.final_models();
        assert_eq!(models.len(), 5, "{}: every node finishes", variant);
        for (id, model) in models {
            assert!(
                model.l2_norm() <= bound,
                "{}: node {} final norm {} exceeds {}",
                variant,
                id,
                model.l2_norm(),
                bound
            );
        }
    }
}

#[test]
fn symmetric_pairwise_reaches_accuracy_threshold() {
    let t = 3;
    let rounds = 20;
    let shards = partition(separable(8), 2, PartitionStrategy::RoundRobin).unwrap();
    let mut cfg = config(GossipVariant::UniformPairwise, t, rounds, 1e-9);
    cfg.write_back = WriteBack::Symmetric;
    let mut engine = GadgetEngine::new(cfg, shards, None).unwrap();
    let g = Graph::complete(2);

    let mut converged_cycles = 0;
    let summary = CycleScheduler::new(ActivationOrder::Sequential, 10_000, 0)
        .run_with(&mut engine, &g, |report| {
            if report.observation.converged {
                converged_cycles += 1;
            }
            assert!(
                report.observation.max_std_dev < 10.0,
                "spread must stay bounded, got {} at cycle {}",
                report.observation.max_std_dev,
                report.cycle
            );
            Ok(())
        })
        .unwrap();

    assert!(summary.finished);
    assert!(converged_cycles > 0, "threshold never reached");
    // One round agrees, so each iteration is local + gossip + settle.
    assert_eq!(summary.cycles, u64::from(3 * t + 1));
    assert!(summary.cycles < u64::from(t * (rounds + 2) + 1));

    let models = engine.final_models();
    assert_eq!(models.len(), 2);
    assert!(
        models[0].1.max_abs_diff(&models[1].1) < 1e-12,
        "final models should agree"
    );
    assert!(models[0].1.l2_norm() <= 1.0 / 0.1_f64.sqrt() + 1e-9);
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

struct BrokenOracle;

impl MixingOracle for BrokenOracle {
    fn name(&self) -> &str {
        "broken"
    }

    fn compute(
        &self,
        _adjacency: &gadget_core::Adjacency,
    ) -> Result<gadget_core::MixingMatrix, GadgetError> {
        Err(GadgetError::MixingOracle("solver unavailable".to_string()))
    }
}

#[test]
fn failing_oracle_is_fatal_only_for_matrix_variants() {
    let g = Graph::ring(3);

    let shards = partition(separable(6), 3, PartitionStrategy::RoundRobin).unwrap();
    let mut engine = GadgetEngine::new(
        config(GossipVariant::MatrixWeighted, 2, 2, -1.0),
        shards,
        Some(Box::new(BrokenOracle)),
    )
    .unwrap();
    let err = CycleScheduler::new(ActivationOrder::Sequential, 100, 0)
        .run(&mut engine, &g)
        .unwrap_err();
    assert!(matches!(err, GadgetError::MixingOracle(_)));

    let shards = partition(separable(6), 3, PartitionStrategy::RoundRobin).unwrap();
    let mut engine = GadgetEngine::new(
        config(GossipVariant::PushsumSinglePhase, 2, 2, -1.0),
        shards,
        Some(Box::new(BrokenOracle)),
    )
    .unwrap();
    let summary = CycleScheduler::new(ActivationOrder::Sequential, 100, 0)
        .run(&mut engine, &g)
        .unwrap();
    assert!(summary.finished);
}
