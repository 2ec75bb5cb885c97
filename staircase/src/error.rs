//! Typed staircase errors.
//!
//! `StaircaseError` covers contract violations only: bad configuration at
//! start, host sequencing bugs, and out-of-set inputs. Ordinary session
//! endings (convergence, trial cap, abort) are expressed through
//! [`crate::state::SessionStatusV1`] and never as errors.

use uli_kernel::carrier::stimulus::StimulusError;

use crate::state::SessionStatusV1;

/// Typed failure for staircase operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaircaseError {
    /// Construction-time contract violation (bounds, steps, stimulus set).
    InvalidPolicy { detail: String },
    /// An operation that needs a running session was called after a
    /// terminal status.
    SessionNotRunning { status: SessionStatusV1 },
    /// An estimate was requested in a status that does not allow it.
    SessionNotConverged { status: SessionStatusV1 },
    /// The session ended without a single reversal, so no midpoint exists.
    NoReversals { status: SessionStatusV1 },
    /// The listener's response is neither a timeout nor a member of the
    /// stimulus set.
    InvalidResponse { response: String },
    /// The presented stimulus is not a member of the stimulus set.
    UnknownStimulus { stimulus: String },
    /// A stimulus selector returned an index outside the candidate list.
    SelectorContractViolation { index: usize, candidates: usize },
}

impl std::fmt::Display for StaircaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPolicy { detail } => write!(f, "invalid policy: {detail}"),
            Self::SessionNotRunning { status } => {
                write!(f, "session is not running (status: {status})")
            }
            Self::SessionNotConverged { status } => {
                write!(f, "session has not converged (status: {status})")
            }
            Self::NoReversals { status } => {
                write!(f, "session ended with no reversals (status: {status})")
            }
            Self::InvalidResponse { response } => {
                write!(f, "response {response:?} is not in the stimulus set")
            }
            Self::UnknownStimulus { stimulus } => {
                write!(f, "presented stimulus {stimulus:?} is not in the stimulus set")
            }
            Self::SelectorContractViolation { index, candidates } => write!(
                f,
                "stimulus selector returned index {index} for {candidates} candidates"
            ),
        }
    }
}

impl std::error::Error for StaircaseError {}

impl From<StimulusError> for StaircaseError {
    fn from(e: StimulusError) -> Self {
        Self::InvalidPolicy {
            detail: e.to_string(),
        }
    }
}
