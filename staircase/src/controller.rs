//! The N-down/1-up staircase controller.
//!
//! One controller drives one session. The host loop is:
//!
//! ```text
//! start(policy, set, selector)
//! while status == Running:
//!     target = next_stimulus()
//!     (present target at current_level, collect response)
//!     submit_response(target, response, timestamp_ms)
//! final_estimate()  or  partial_estimate()
//! ```
//!
//! `submit_response` is the only operation that records trials. Per call it
//! scores the response, updates the correct-run counter, picks a direction,
//! applies and clamps the step, detects a reversal against the last
//! level-changing move, and re-evaluates status (convergence is checked
//! before the trial cap).

use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::carrier::stimulus::{StimulusId, StimulusSetV1};

use crate::error::StaircaseError;
use crate::estimate::midpoint_estimate;
use crate::policy::StaircasePolicyV1;
use crate::selector::StimulusSelector;
use crate::state::{ControllerStateV1, SessionStatusV1};
use crate::trial::{Direction, ResponseV1, TrialV1};

/// Minimum stimulus set size for a forced-choice task.
pub const MIN_ALTERNATIVES: usize = 2;

/// Adaptive threshold search over one session.
#[derive(Debug, Clone)]
pub struct StaircaseController<S: StimulusSelector> {
    policy: StaircasePolicyV1,
    stimulus_set: StimulusSetV1,
    selector: S,
    state: ControllerStateV1,
    /// Previous target, excluded from the next draw.
    last_target: Option<StimulusId>,
}

impl<S: StimulusSelector> StaircaseController<S> {
    /// Validate the configuration and open a session at `initial_level`.
    ///
    /// # Errors
    ///
    /// Returns [`StaircaseError::InvalidPolicy`] if the policy fails
    /// [`StaircasePolicyV1::validate`] or the stimulus set has fewer than
    /// [`MIN_ALTERNATIVES`] members.
    pub fn start(
        policy: StaircasePolicyV1,
        stimulus_set: StimulusSetV1,
        selector: S,
    ) -> Result<Self, StaircaseError> {
        policy.validate()?;
        if stimulus_set.len() < MIN_ALTERNATIVES {
            return Err(StaircaseError::InvalidPolicy {
                detail: format!(
                    "stimulus set needs at least {MIN_ALTERNATIVES} distinct members, got {}",
                    stimulus_set.len()
                ),
            });
        }
        tracing::info!(
            initial_level = %policy.initial_level,
            alternatives = stimulus_set.len(),
            selector = %selector.selector_id(),
            "staircase session started"
        );
        Ok(Self {
            state: ControllerStateV1::fresh(policy.initial_level),
            policy,
            stimulus_set,
            selector,
            last_target: None,
        })
    }

    /// Pick the target for the upcoming trial.
    ///
    /// The draw excludes the previous target, so two consecutive calls never
    /// return the same stimulus.
    ///
    /// # Errors
    ///
    /// - [`StaircaseError::SessionNotRunning`] after a terminal status.
    /// - [`StaircaseError::SelectorContractViolation`] if the selector returns
    ///   an out-of-range index.
    pub fn next_stimulus(&mut self) -> Result<StimulusId, StaircaseError> {
        self.require_running("next_stimulus")?;
        let candidates: Vec<&StimulusId> = self
            .stimulus_set
            .iter()
            .filter(|id| self.last_target.as_ref() != Some(*id))
            .collect();
        let index = self.selector.select(&candidates);
        let Some(target) = candidates.get(index).map(|id| (*id).clone()) else {
            tracing::warn!(index, candidates = candidates.len(), "selector returned out-of-range index");
            return Err(StaircaseError::SelectorContractViolation {
                index,
                candidates: candidates.len(),
            });
        };
        self.last_target = Some(target.clone());
        Ok(target)
    }

    /// Record one trial and advance the staircase.
    ///
    /// `presented` is the stimulus actually played at
    /// [`ControllerStateV1::current_level`]. A [`ResponseV1::Timeout`] is
    /// scored as incorrect.
    ///
    /// # Errors
    ///
    /// - [`StaircaseError::SessionNotRunning`] after a terminal status.
    /// - [`StaircaseError::UnknownStimulus`] if `presented` is not in the set.
    /// - [`StaircaseError::InvalidResponse`] if a selected response is not in
    ///   the set.
    ///
    /// On error nothing is recorded.
    pub fn submit_response(
        &mut self,
        presented: &StimulusId,
        response: ResponseV1,
        timestamp_ms: u64,
    ) -> Result<&TrialV1, StaircaseError> {
        self.require_running("submit_response")?;
        if !self.stimulus_set.contains(presented) {
            tracing::warn!(stimulus = %presented, "presented stimulus not in set");
            return Err(StaircaseError::UnknownStimulus {
                stimulus: presented.as_str().to_string(),
            });
        }
        if let Some(selected) = response.selected() {
            if !self.stimulus_set.contains(selected) {
                tracing::warn!(response = %selected, "response not in set");
                return Err(StaircaseError::InvalidResponse {
                    response: selected.as_str().to_string(),
                });
            }
        }

        let correct = response.selected() == Some(presented);
        let level_before = self.state.current_level;
        let state = &mut self.state;

        if correct {
            state.consecutive_correct_count = state.consecutive_correct_count.saturating_add(1);
        } else {
            state.consecutive_correct_count = 0;
        }

        let direction = if !correct {
            Direction::Up
        } else if state.consecutive_correct_count >= self.policy.n_correct_for_down {
            state.consecutive_correct_count = 0;
            Direction::Down
        } else {
            Direction::None
        };

        let moved = match direction {
            Direction::Up => level_before.raised_by(self.policy.step_up),
            Direction::Down => level_before.lowered_by(self.policy.step_down),
            Direction::None => level_before,
        };
        state.current_level = moved.clamped(self.policy.level_floor, self.policy.level_ceiling);

        let reversal = direction.is_move()
            && state.last_move.is_some_and(|previous| previous != direction);
        if reversal {
            state.reversal_levels.push(level_before);
        }
        if direction.is_move() {
            state.last_move = Some(direction);
        }

        let index = state.trial_history.len() as u64;
        state.trial_history.push(TrialV1 {
            index,
            presented_stimulus: presented.clone(),
            presented_level: level_before,
            response,
            correct,
            direction,
            level_after: state.current_level,
            reversal,
            timestamp_ms,
        });
        self.last_target = Some(presented.clone());

        tracing::debug!(
            index,
            level = %level_before,
            correct,
            direction = %direction,
            reversal,
            level_after = %state.current_level,
            "trial recorded"
        );

        let required = self.policy.min_reversals_for_convergence as usize;
        let cap = self.policy.max_trials as usize;
        if state.reversal_levels.len() >= required {
            state.transition(SessionStatusV1::Converged);
        } else if state.trial_history.len() >= cap {
            state.transition(SessionStatusV1::MaxTrialsReached);
        }

        // The trial was pushed above; the history is non-empty.
        let recorded = self.state.trial_history.len() - 1;
        Ok(&self.state.trial_history[recorded])
    }

    /// Force `Aborted`. A no-op once the session is terminal.
    ///
    /// Returns the resulting status.
    pub fn abort(&mut self) -> SessionStatusV1 {
        self.state.transition(SessionStatusV1::Aborted);
        self.state.status
    }

    /// Threshold estimate of a converged session, in dB.
    ///
    /// Mean of the last `min_reversals_for_convergence` reversal levels.
    ///
    /// # Errors
    ///
    /// Returns [`StaircaseError::SessionNotConverged`] unless the status is
    /// `Converged`.
    pub fn final_estimate(&self) -> Result<f64, StaircaseError> {
        if self.state.status != SessionStatusV1::Converged {
            return Err(StaircaseError::SessionNotConverged {
                status: self.state.status,
            });
        }
        self.midpoint()
    }

    /// The same midpoint estimate, available in any terminal status.
    ///
    /// # Errors
    ///
    /// - [`StaircaseError::SessionNotConverged`] while still `Running`.
    /// - [`StaircaseError::NoReversals`] if the session ended before the
    ///   first reversal.
    pub fn partial_estimate(&self) -> Result<f64, StaircaseError> {
        if !self.state.status.is_terminal() {
            return Err(StaircaseError::SessionNotConverged {
                status: self.state.status,
            });
        }
        self.midpoint()
    }

    fn midpoint(&self) -> Result<f64, StaircaseError> {
        midpoint_estimate(
            &self.state.reversal_levels,
            self.policy.min_reversals_for_convergence as usize,
        )
        .ok_or(StaircaseError::NoReversals {
            status: self.state.status,
        })
    }

    fn require_running(&self, operation: &str) -> Result<(), StaircaseError> {
        if self.state.status.is_terminal() {
            tracing::warn!(operation, status = %self.state.status, "operation on terminal session");
            return Err(StaircaseError::SessionNotRunning {
                status: self.state.status,
            });
        }
        Ok(())
    }

    /// Session state (read-only).
    #[must_use]
    pub fn state(&self) -> &ControllerStateV1 {
        &self.state
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SessionStatusV1 {
        self.state.status
    }

    /// Level the next trial will be presented at.
    #[must_use]
    pub fn current_level(&self) -> SnrLevel {
        self.state.current_level
    }

    #[must_use]
    pub fn policy(&self) -> &StaircasePolicyV1 {
        &self.policy
    }

    #[must_use]
    pub fn stimulus_set(&self) -> &StimulusSetV1 {
        &self.stimulus_set
    }

    /// Identifier of the selector driving `next_stimulus`.
    #[must_use]
    pub fn selector_id(&self) -> String {
        self.selector.selector_id()
    }

    /// End the session and hand the state to the host.
    #[must_use]
    pub fn into_state(self) -> ControllerStateV1 {
        self.state
    }
}
