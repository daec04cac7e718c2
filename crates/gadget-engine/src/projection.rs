// crates/gadget-engine/src/projection.rs
//
// Norm-ball scaling step applied after local training or gossip.

use gadget_core::WeightVector;

use crate::config::ProjectionMode;

/// `min(1, 1 / (sqrt(lambda) * |w|))`; 1.0 for the zero vector.
pub fn projection_scale(weights: &WeightVector, lambda: f64) -> f64 {
    let norm = weights.l2_norm();
    if norm == 0.0 {
        return 1.0;
    }
    (1.0 / (lambda.sqrt() * norm)).min(1.0)
}

/// Scale `weights` in place according to `mode`. Returns the computed scale.
pub fn project(weights: &mut WeightVector, lambda: f64, mode: ProjectionMode) -> f64 {
    let scale = projection_scale(weights, lambda);
    match mode {
        ProjectionMode::NormBall => weights.scale(scale),
        ProjectionMode::LegacyOffset => weights.scale(1.0 + scale),
        ProjectionMode::LegacyOffsetNormalized => {
            weights.scale(1.0 + scale);
            weights.normalize();
        }
    }
    scale
}
