// crates/gadget-engine/src/config.rs
//
// Engine parameters: learning rate, outer iteration budget, convergence
// threshold and the gossip variant. Fixed for the whole run and validated once
// before the first node is stepped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use gadget_core::GadgetError;

/// Gossip averaging strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GossipVariant {
    /// Sum with one random neighbor (unnormalized; projection rescales).
    UniformPairwise,
    /// Weighted sum over all neighbors using the mixing matrix.
    MatrixWeighted,
    /// Average with one random neighbor, written into both sides at once.
    #[serde(alias = "pushsum1")]
    PushsumSinglePhase,
    /// Mass-conserving push-sum with staged send/receive sub-phases.
    #[default]
    #[serde(alias = "pushsum2")]
    PushsumTwoPhase,
}

impl GossipVariant {
    /// Whether this variant reads the mixing matrix.
    pub fn needs_mixing_matrix(self) -> bool {
        matches!(
            self,
            GossipVariant::MatrixWeighted | GossipVariant::PushsumTwoPhase
        )
    }

    /// Whether node values are `w / mass` rather than `w`.
    pub fn tracks_mass(self) -> bool {
        self == GossipVariant::PushsumTwoPhase
    }
}

impl fmt::Display for GossipVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GossipVariant::UniformPairwise => write!(f, "uniform-pairwise"),
            GossipVariant::MatrixWeighted => write!(f, "matrix-weighted"),
            GossipVariant::PushsumSinglePhase => write!(f, "pushsum-single-phase"),
            GossipVariant::PushsumTwoPhase => write!(f, "pushsum-two-phase"),
        }
    }
}

impl FromStr for GossipVariant {
    type Err = GadgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform-pairwise" => Ok(GossipVariant::UniformPairwise),
            "matrix-weighted" => Ok(GossipVariant::MatrixWeighted),
            "pushsum-single-phase" | "pushsum1" => Ok(GossipVariant::PushsumSinglePhase),
            "pushsum-two-phase" | "pushsum2" => Ok(GossipVariant::PushsumTwoPhase),
            other => Err(GadgetError::InvalidConfig(format!(
                "unknown gossip variant '{}'",
                other
            ))),
        }
    }
}

/// Whether uniform-pairwise gossip also writes the sum into the chosen peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteBack {
    #[default]
    Symmetric,
    Asymmetric,
}

/// Form of the norm-ball scaling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionMode {
    /// `w <- scale * w`; guarantees `|w| <= 1/sqrt(lambda)`.
    #[default]
    NormBall,
    /// `w <- (1 + scale) * w`. Does not bound the norm.
    LegacyOffset,
    /// `w <- (1 + scale) * w`, then rescale to unit norm.
    LegacyOffsetNormalized,
}

/// Weight decay applied by the local sub-gradient step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecayMode {
    /// Decay by `(1 - lambda * alpha) * N`, N = shard size.
    #[default]
    ShardScaled,
    /// Decay by `(1 - lambda * alpha)`.
    Unscaled,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SVM regularisation / learning-rate parameter. Must be > 0.
    #[serde(default = "default_lambda")]
    pub lambda: f64,

    /// Outer iteration budget `T`. Must be >= 1.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Per-dimension standard deviation threshold. Negative disables
    /// convergence-based early exit from gossip.
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,

    #[serde(default)]
    pub variant: GossipVariant,

    #[serde(default)]
    pub write_back: WriteBack,

    #[serde(default)]
    pub projection: ProjectionMode,

    #[serde(default)]
    pub decay: DecayMode,

    /// Gossip rounds allowed per outer iteration before moving on regardless
    /// of convergence.
    #[serde(default = "default_max_gossip_rounds")]
    pub max_gossip_rounds: u32,

    /// Seed for gossip partner selection.
    #[serde(default)]
    pub seed: u64,
}

fn default_lambda() -> f64 {
    0.01
}

fn default_iterations() -> u32 {
    100
}

fn default_accuracy() -> f64 {
    -1.0
}

fn default_max_gossip_rounds() -> u32 {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lambda: default_lambda(),
            iterations: default_iterations(),
            accuracy: default_accuracy(),
            variant: GossipVariant::default(),
            write_back: WriteBack::default(),
            projection: ProjectionMode::default(),
            decay: DecayMode::default(),
            max_gossip_rounds: default_max_gossip_rounds(),
            seed: 0,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), GadgetError> {
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(GadgetError::InvalidConfig(format!(
                "lambda must be a positive finite number, got {}",
                self.lambda
            )));
        }
        if self.iterations < 1 {
            return Err(GadgetError::InvalidConfig(
                "iteration budget must be at least 1".to_string(),
            ));
        }
        if self.accuracy.is_nan() {
            return Err(GadgetError::InvalidConfig(
                "accuracy threshold must be a number".to_string(),
            ));
        }
        if self.max_gossip_rounds < 1 {
            return Err(GadgetError::InvalidConfig(
                "max_gossip_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_lambda() {
        for lambda in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let config = EngineConfig {
                lambda,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(GadgetError::InvalidConfig(_))),
                "lambda {} should be rejected",
                lambda
            );
        }
    }

    #[test]
    fn rejects_zero_iterations_and_rounds() {
        let config = EngineConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            max_gossip_rounds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn variant_names_round_trip_through_display() {
        for variant in [
            GossipVariant::UniformPairwise,
            GossipVariant::MatrixWeighted,
            GossipVariant::PushsumSinglePhase,
            GossipVariant::PushsumTwoPhase,
        ] {
            let parsed: GossipVariant = variant.to_string().parse().unwrap();
            assert_eq!(parsed, variant);
        }
        assert_eq!(
            "pushsum1".parse::<GossipVariant>().unwrap(),
            GossipVariant::PushsumSinglePhase
        );
        assert!("gossip".parse::<GossipVariant>().is_err());
    }

    #[test]
    fn matrix_requirement_per_variant() {
        assert!(GossipVariant::MatrixWeighted.needs_mixing_matrix());
        assert!(GossipVariant::PushsumTwoPhase.needs_mixing_matrix());
        assert!(!GossipVariant::UniformPairwise.needs_mixing_matrix());
        assert!(!GossipVariant::PushsumSinglePhase.needs_mixing_matrix());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"lambda": 0.1, "variant": "matrix-weighted"}"#).unwrap();
        assert_eq!(config.lambda, 0.1);
        assert_eq!(config.variant, GossipVariant::MatrixWeighted);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.projection, ProjectionMode::NormBall);
    }
}
