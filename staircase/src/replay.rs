//! `replay_verify()`: verify a trial tape by deterministic replay.
//!
//! The header's policy snapshot and stimulus set rebuild a fresh
//! controller. Every recorded `(presented, response, timestamp_ms)` triple
//! is resubmitted and the recomputed trial is compared field by field with
//! the recorded one. The footer's status, reversal levels and estimate are
//! then checked against the replayed session.
//!
//! Replay never calls `next_stimulus`: targets come from the tape, so the
//! live selector's seed is not needed.

use uli_kernel::carrier::level::SnrLevel;

use crate::controller::StaircaseController;
use crate::error::StaircaseError;
use crate::selector::CyclicSelector;
use crate::state::SessionStatusV1;
use crate::tape::TrialTapeV1;
use crate::trial::TrialV1;

/// Replay outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayVerdictV1 {
    /// Every trial and the footer match.
    Match,
    /// First point of disagreement. `trial_index` is `None` when the
    /// disagreement is in the footer.
    Divergence {
        trial_index: Option<u64>,
        detail: String,
    },
}

impl ReplayVerdictV1 {
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Re-drive the session recorded in `tape` and compare.
///
/// # Errors
///
/// Returns [`StaircaseError::InvalidPolicy`] if the header's policy or
/// stimulus set cannot start a session. That means the tape cannot be
/// replayed at all, as distinct from a [`ReplayVerdictV1::Divergence`].
pub fn replay_verify(tape: &TrialTapeV1) -> Result<ReplayVerdictV1, StaircaseError> {
    let mut controller = StaircaseController::start(
        tape.header.policy,
        tape.header.stimulus_set.clone(),
        CyclicSelector::default(),
    )?;

    for recorded in &tape.trials {
        let replayed = match controller.submit_response(
            &recorded.presented_stimulus,
            recorded.response.clone(),
            recorded.timestamp_ms,
        ) {
            Ok(trial) => trial.clone(),
            Err(e) => {
                return Ok(diverge(Some(recorded.index), format!("replay rejected trial: {e}")));
            }
        };
        if let Some(detail) = compare_trial(recorded, &replayed) {
            tracing::warn!(index = recorded.index, %detail, "replay divergence");
            return Ok(diverge(Some(recorded.index), detail));
        }
    }

    if tape.footer.status == SessionStatusV1::Aborted {
        controller.abort();
    }

    let footer = &tape.footer;
    if controller.status() != footer.status {
        return Ok(diverge(
            None,
            format!("status: recorded {}, replayed {}", footer.status, controller.status()),
        ));
    }
    if controller.state().reversal_levels() != footer.reversal_levels.as_slice() {
        return Ok(diverge(None, "reversal levels differ".into()));
    }
    let estimate = controller.partial_estimate().ok().and_then(SnrLevel::from_db);
    if estimate != footer.estimate {
        return Ok(diverge(
            None,
            format!("estimate: recorded {:?}, replayed {estimate:?}", footer.estimate),
        ));
    }

    tracing::debug!(trials = tape.trials.len(), "replay matched");
    Ok(ReplayVerdictV1::Match)
}

fn diverge(trial_index: Option<u64>, detail: String) -> ReplayVerdictV1 {
    ReplayVerdictV1::Divergence {
        trial_index,
        detail,
    }
}

fn compare_trial(recorded: &TrialV1, replayed: &TrialV1) -> Option<String> {
    if recorded.index != replayed.index {
        return Some(format!("index: recorded {}, replayed {}", recorded.index, replayed.index));
    }
    if recorded.presented_level != replayed.presented_level {
        return Some(format!(
            "presented_level: recorded {}, replayed {}",
            recorded.presented_level, replayed.presented_level
        ));
    }
    if recorded.correct != replayed.correct {
        return Some(format!(
            "correct: recorded {}, replayed {}",
            recorded.correct, replayed.correct
        ));
    }
    if recorded.direction != replayed.direction {
        return Some(format!(
            "direction: recorded {}, replayed {}",
            recorded.direction, replayed.direction
        ));
    }
    if recorded.level_after != replayed.level_after {
        return Some(format!(
            "level_after: recorded {}, replayed {}",
            recorded.level_after, replayed.level_after
        ));
    }
    if recorded.reversal != replayed.reversal {
        return Some(format!(
            "reversal: recorded {}, replayed {}",
            recorded.reversal, replayed.reversal
        ));
    }
    None
}
