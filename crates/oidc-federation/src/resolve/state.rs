//! Resolution states.
//!
//! ```text
//! Start -> Resolving -> AnchorReached -> PolicyMerging -> PolicyApplying -> Resolved
//!              |                              |
//!              +-> ConstraintViolation         +-> PolicyConflict
//!              +-> SignatureInvalid
//!              +-> Expired
//!              +-> CycleDetected
//!              +-> NoPath
//! ```
//!
//! Per-hint failures inside `Resolving` backtrack and do not leave the
//! state. Every terminal failure is final for the call.

use serde::{Deserialize, Serialize};

/// A state of one trust chain resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Start,
    Resolving,
    AnchorReached,
    PolicyMerging,
    PolicyApplying,
    Resolved,
    ConstraintViolation,
    SignatureInvalid,
    Expired,
    CycleDetected,
    NoPath,
    PolicyConflict,
}

impl ResolutionState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            ResolutionState::Start
                | ResolutionState::Resolving
                | ResolutionState::AnchorReached
                | ResolutionState::PolicyMerging
                | ResolutionState::PolicyApplying
        )
    }

    /// Whether this is a terminal failure.
    pub fn is_failure(self) -> bool {
        self.is_terminal() && self != ResolutionState::Resolved
    }

    /// Whether `next` may follow `self`.
    pub fn can_transition_to(self, next: ResolutionState) -> bool {
        use ResolutionState::*;
        match self {
            Start => next == Resolving,
            Resolving => matches!(
                next,
                AnchorReached
                    | ConstraintViolation
                    | SignatureInvalid
                    | Expired
                    | CycleDetected
                    | NoPath
            ),
            AnchorReached => next == PolicyMerging,
            PolicyMerging => matches!(next, PolicyApplying | PolicyConflict),
            PolicyApplying => matches!(next, Resolved | PolicyConflict),
            _ => false,
        }
    }
}

impl std::fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResolutionState::Start => "start",
            ResolutionState::Resolving => "resolving",
            ResolutionState::AnchorReached => "anchor_reached",
            ResolutionState::PolicyMerging => "policy_merging",
            ResolutionState::PolicyApplying => "policy_applying",
            ResolutionState::Resolved => "resolved",
            ResolutionState::ConstraintViolation => "constraint_violation",
            ResolutionState::SignatureInvalid => "signature_invalid",
            ResolutionState::Expired => "expired",
            ResolutionState::CycleDetected => "cycle_detected",
            ResolutionState::NoPath => "no_path",
            ResolutionState::PolicyConflict => "policy_conflict",
        };
        f.write_str(s)
    }
}
