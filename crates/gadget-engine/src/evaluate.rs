// crates/gadget-engine/src/evaluate.rs

use serde::{Deserialize, Serialize};

use gadget_core::{TrainingExample, WeightVector};

/// Quality of a linear model on a labeled set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub examples: usize,
    /// Examples with `y * <w, x> <= 0`.
    pub errors: usize,
    /// `1 - errors / examples`; 0.0 for an empty set.
    pub accuracy: f64,
    /// Mean of `max(0, 1 - y * <w, x>)`.
    pub mean_hinge_loss: f64,
}

/// Score `model` on `examples`. A zero score counts as an error.
pub fn evaluate(model: &WeightVector, examples: &[TrainingExample]) -> Evaluation {
    if examples.is_empty() {
        return Evaluation {
            examples: 0,
            errors: 0,
            accuracy: 0.0,
            mean_hinge_loss: 0.0,
        };
    }

    let mut errors = 0;
    let mut hinge = 0.0;
    for example in examples {
        let margin = example.y() * model.dot(example.features());
        if margin <= 0.0 {
            errors += 1;
        }
        hinge += (1.0 - margin).max(0.0);
    }

    let n = examples.len() as f64;
    Evaluation {
        examples: examples.len(),
        errors,
        accuracy: 1.0 - errors as f64 / n,
        mean_hinge_loss: hinge / n,
    }
}
