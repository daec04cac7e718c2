// crates/gadget-engine/src/phase.rs
//
// Per-node cycle phase state machine.
//
// Valid transitions:
//   LocalUpdate -> GossipWait -> LocalUpdate       (next outer iteration)
//   GossipWait -> Finalize -> Done                  (budget exhausted)
//   LocalUpdate -> Finalize                         (forced at cycle limit)

use std::fmt;

use serde::{Deserialize, Serialize};

use gadget_core::GadgetError;

/// Phase a node will execute on its next activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Run the local sub-gradient step.
    LocalUpdate,
    /// Run gossip rounds until convergence or the round budget.
    GossipWait,
    /// Average the accumulated model.
    Finalize,
    /// Terminal; further activations are no-ops.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::LocalUpdate => write!(f, "LocalUpdate"),
            Phase::GossipWait => write!(f, "GossipWait"),
            Phase::Finalize => write!(f, "Finalize"),
            Phase::Done => write!(f, "Done"),
        }
    }
}

/// Tracks one node's phase and rejects out-of-order transitions.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    pub current: Phase,
}

impl PhaseMachine {
    /// Start in `LocalUpdate`.
    pub fn new() -> Self {
        Self {
            current: Phase::LocalUpdate,
        }
    }

    /// Attempt to move to `next`.
    pub fn transition(&mut self, next: Phase) -> Result<(), GadgetError> {
        let valid = matches!(
            (self.current, next),
            (Phase::LocalUpdate, Phase::GossipWait)
                | (Phase::GossipWait, Phase::LocalUpdate)
                | (Phase::GossipWait, Phase::Finalize)
                | (Phase::LocalUpdate, Phase::Finalize)
                | (Phase::Finalize, Phase::Done)
        );

        if valid {
            tracing::trace!("Phase transition: {} -> {}", self.current, next);
            self.current = next;
            Ok(())
        } else {
            Err(GadgetError::InvalidState(format!(
                "Invalid phase transition: {} -> {}",
                self.current, next
            )))
        }
    }

    pub fn is_done(&self) -> bool {
        self.current == Phase::Done
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
