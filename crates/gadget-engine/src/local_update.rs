// crates/gadget-engine/src/local_update.rs
//
// One PEGASOS-style hinge-loss sub-gradient pass over a node's shard.

use gadget_core::{GadgetError, TrainingExample, WeightVector};

use crate::config::DecayMode;

/// Diagnostics from one local pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalStep {
    /// Step size `1 / (lambda * t)`.
    pub alpha: f64,
    /// Examples with `y * <w, x> < 1`.
    pub violators: usize,
    /// Examples with `y * <w, x> < 0`.
    pub misclassified: usize,
}

/// Apply one sub-gradient step to `weights` in place.
///
/// Margins are measured against the weights as they were on entry. An empty
/// shard leaves `weights` untouched.
pub fn local_update(
    weights: &mut WeightVector,
    shard: &[TrainingExample],
    t: u32,
    lambda: f64,
    decay: DecayMode,
) -> Result<LocalStep, GadgetError> {
    if t == 0 {
        return Err(GadgetError::InvalidState(
            "iteration counter must start at 1".to_string(),
        ));
    }
    let alpha = 1.0 / (lambda * t as f64);
    let mut step = LocalStep {
        alpha,
        violators: 0,
        misclassified: 0,
    };
    if shard.is_empty() {
        return Ok(step);
    }

    let mut loss = WeightVector::new();
    for example in shard {
        let margin = example.y() * weights.dot(example.features());
        if margin < 1.0 {
            step.violators += 1;
            for &(dim, x) in example.features() {
                loss.add(dim, example.y() * x);
            }
            if margin < 0.0 {
                step.misclassified += 1;
            }
        }
    }

    let shrink = 1.0 - lambda * alpha;
    let factor = match decay {
        DecayMode::ShardScaled => shrink * shard.len() as f64,
        DecayMode::Unscaled => shrink,
    };
    weights.scale(factor);
    weights.add_scaled(&loss, alpha);
    Ok(step)
}
