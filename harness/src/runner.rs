//! Session runner: drives one staircase session against a listener.
//!
//! The runner uses ONLY staircase APIs: `start`, `next_stimulus`,
//! `submit_response`, `abort`, `write_session`, `read_tape`,
//! `replay_verify`. It does not implement any staircase logic itself.
//!
//! # Pipeline
//!
//! ```text
//! start() → [next_stimulus() → listener.respond() → submit_response()] × N
//!   → write_session() → read_tape() → replay_verify()
//!   → score_trials() → normative compare → SessionRecordV1
//! ```
//!
//! Trial `i` is stamped `i * trial_interval_ms` on a logical clock, so a
//! session is a pure function of its config and its listener.

use std::panic::{catch_unwind, AssertUnwindSafe};

use uli_staircase::error::StaircaseError;
use uli_staircase::tape::{TapeParseError, TapeWriteError};
use uli_staircase::tape_reader::read_tape;
use uli_staircase::tape_writer::write_session;
use uli_staircase::{
    replay_verify, ControllerStateV1, ReplayVerdictV1, SeededSelector, SessionStatusV1,
    StaircaseController, TapeOutput,
};

use crate::config::SessionConfigV1;
use crate::contract::ListenerV1;
use crate::normative::{NormativeComparisonV1, NormativeError};
use crate::scoring::{score_trials, CategoryScoresV1};

/// Error during a session run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Controller rejected the configuration or a listener response.
    Staircase(StaircaseError),
    /// Tape serialization failed.
    TapeWrite(TapeWriteError),
    /// The tape just written did not parse back.
    TapeReadBack(TapeParseError),
    /// Replay of the written tape disagreed with the live run.
    ReplayDivergence {
        trial_index: Option<u64>,
        detail: String,
    },
    /// Normative comparison failed.
    Normative(NormativeError),
    /// Controller stopped in a state the runner cannot explain.
    UnexpectedStatus { status: SessionStatusV1 },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Staircase(e) => write!(f, "staircase error: {e}"),
            Self::TapeWrite(e) => write!(f, "tape write failed: {e}"),
            Self::TapeReadBack(e) => write!(f, "written tape does not parse: {e}"),
            Self::ReplayDivergence {
                trial_index: Some(i),
                detail,
            } => write!(f, "replay diverged at trial {i}: {detail}"),
            Self::ReplayDivergence {
                trial_index: None,
                detail,
            } => write!(f, "replay diverged at footer: {detail}"),
            Self::Normative(e) => write!(f, "normative comparison failed: {e}"),
            Self::UnexpectedStatus { status } => {
                write!(f, "session stopped with status {}", status.as_str())
            }
        }
    }
}

impl std::error::Error for RunError {}

impl From<StaircaseError> for RunError {
    fn from(e: StaircaseError) -> Self {
        Self::Staircase(e)
    }
}

impl From<TapeWriteError> for RunError {
    fn from(e: TapeWriteError) -> Self {
        Self::TapeWrite(e)
    }
}

impl From<NormativeError> for RunError {
    fn from(e: NormativeError) -> Self {
        Self::Normative(e)
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndV1 {
    Converged,
    MaxTrialsReached,
    /// Host stop after `after_trials` recorded trials.
    AbortedByHost { after_trials: u64 },
    /// The listener panicked while answering trial `trial_index`; that trial
    /// is not recorded.
    ListenerPanicked { trial_index: u64 },
}

impl SessionEndV1 {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::MaxTrialsReached => "max_trials_reached",
            Self::AbortedByHost { .. } => "aborted_by_host",
            Self::ListenerPanicked { .. } => "listener_panicked",
        }
    }
}

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionRecordV1 {
    pub config: SessionConfigV1,
    pub listener_id: String,
    pub state: ControllerStateV1,
    /// Present only for a converged session.
    pub final_estimate: Option<f64>,
    /// Present whenever at least one reversal was recorded.
    pub partial_estimate: Option<f64>,
    /// Present whenever `partial_estimate` is.
    pub normative: Option<NormativeComparisonV1>,
    pub scores: CategoryScoresV1,
    pub tape: TapeOutput,
    pub end: SessionEndV1,
}

impl SessionRecordV1 {
    #[must_use]
    pub fn status(&self) -> SessionStatusV1 {
        self.state.status()
    }
}

/// Run one session to a terminal status.
///
/// The listener is called under `catch_unwind`; a panic aborts the session
/// and is reported as [`SessionEndV1::ListenerPanicked`], not as an error.
///
/// # Errors
///
/// Returns [`RunError::Staircase`] if the controller rejects the config or a
/// response, and [`RunError::ReplayDivergence`] if the written tape does not
/// replay to the live outcome.
pub fn run_session(
    config: &SessionConfigV1,
    listener: &mut dyn ListenerV1,
) -> Result<SessionRecordV1, RunError> {
    let listener_id = listener.listener_id();
    tracing::info!(
        session_id = %config.session_id,
        client_id = %config.client_id,
        listener = %listener_id,
        "session started"
    );
    let mut controller = StaircaseController::start(
        config.policy,
        config.stimulus_set.clone(),
        SeededSelector::new(config.selector_seed),
    )?;

    let mut end = None;
    while controller.status() == SessionStatusV1::Running {
        let index = controller.state().trial_history().len() as u64;
        if config
            .abort_after_trials
            .is_some_and(|n| index >= u64::from(n))
        {
            controller.abort();
            end = Some(SessionEndV1::AbortedByHost {
                after_trials: index,
            });
            break;
        }

        let target = controller.next_stimulus()?;
        let level = controller.current_level();
        let answer = catch_unwind(AssertUnwindSafe(|| {
            listener.respond(&target, level, &config.stimulus_set)
        }));
        let Ok(response) = answer else {
            tracing::warn!(trial = index, "listener panicked; aborting session");
            controller.abort();
            end = Some(SessionEndV1::ListenerPanicked { trial_index: index });
            break;
        };
        tracing::debug!(
            trial = index,
            listener = %listener_id,
            timed_out = response.selected().is_none(),
            "listener responded"
        );
        let timestamp_ms = index.saturating_mul(config.trial_interval_ms);
        controller.submit_response(&target, response, timestamp_ms)?;
    }

    let end = match end {
        Some(end) => end,
        None => match controller.status() {
            SessionStatusV1::Converged => SessionEndV1::Converged,
            SessionStatusV1::MaxTrialsReached => SessionEndV1::MaxTrialsReached,
            status => return Err(RunError::UnexpectedStatus { status }),
        },
    };

    let tape = write_session(&config.session_id, &config.client_id, &controller)?;
    let parsed = read_tape(&tape.bytes).map_err(RunError::TapeReadBack)?;
    if let ReplayVerdictV1::Divergence {
        trial_index,
        detail,
    } = replay_verify(&parsed)?
    {
        return Err(RunError::ReplayDivergence {
            trial_index,
            detail,
        });
    }

    let final_estimate = controller.final_estimate().ok();
    let partial_estimate = controller.partial_estimate().ok();
    let normative = partial_estimate
        .map(|est| config.normative.compare(est))
        .transpose()?;
    let state = controller.into_state();
    let scores = score_trials(state.trial_history());

    tracing::info!(
        session_id = %config.session_id,
        end = end.as_str(),
        trials = state.trial_history().len(),
        reversals = state.reversal_levels().len(),
        estimate_db = ?partial_estimate,
        "session finished"
    );

    Ok(SessionRecordV1 {
        config: config.clone(),
        listener_id,
        state,
        final_estimate,
        partial_estimate,
        normative,
        scores,
        tape,
        end,
    })
}
