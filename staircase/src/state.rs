//! Session status state machine and the controller-owned state record.

use uli_kernel::carrier::level::SnrLevel;

use crate::trial::{Direction, TrialV1};

/// Session status.
///
/// `Running` is the only non-terminal status. Every legal edge leaves
/// `Running`; no edge re-enters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatusV1 {
    Running,
    Converged,
    Aborted,
    MaxTrialsReached,
}

impl SessionStatusV1 {
    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether `self → next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(self, Self::Running) && next.is_terminal()
    }

    /// Stable snake-case tag used in tapes and summaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Converged => "converged",
            Self::Aborted => "aborted",
            Self::MaxTrialsReached => "max_trials_reached",
        }
    }

    /// Inverse of [`SessionStatusV1::as_str`].
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "running" => Some(Self::Running),
            "converged" => Some(Self::Converged),
            "aborted" => Some(Self::Aborted),
            "max_trials_reached" => Some(Self::MaxTrialsReached),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatusV1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable session state, owned exclusively by one
/// [`crate::controller::StaircaseController`].
///
/// Fields are readable through accessors and writable only inside this
/// crate, so every mutation goes through `submit_response` or `abort`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStateV1 {
    pub(crate) current_level: SnrLevel,
    pub(crate) consecutive_correct_count: u32,
    pub(crate) reversal_levels: Vec<SnrLevel>,
    pub(crate) trial_history: Vec<TrialV1>,
    pub(crate) status: SessionStatusV1,
    /// Direction of the most recent level-changing move (`Up`/`Down` only).
    pub(crate) last_move: Option<Direction>,
}

impl ControllerStateV1 {
    pub(crate) fn fresh(initial_level: SnrLevel) -> Self {
        Self {
            current_level: initial_level,
            consecutive_correct_count: 0,
            reversal_levels: Vec::new(),
            trial_history: Vec::new(),
            status: SessionStatusV1::Running,
            last_move: None,
        }
    }

    /// Apply a status transition. Illegal transitions are ignored and
    /// reported as `false`.
    pub(crate) fn transition(&mut self, next: SessionStatusV1) -> bool {
        if self.status.can_transition_to(next) {
            tracing::info!(from = %self.status, to = %next, trials = self.trial_history.len(), "session status transition");
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Level the next trial will be presented at.
    #[must_use]
    pub fn current_level(&self) -> SnrLevel {
        self.current_level
    }

    /// Consecutive correct responses since the last level change or error.
    #[must_use]
    pub fn consecutive_correct_count(&self) -> u32 {
        self.consecutive_correct_count
    }

    /// Levels immediately before each reversal, in order.
    #[must_use]
    pub fn reversal_levels(&self) -> &[SnrLevel] {
        &self.reversal_levels
    }

    /// All recorded trials, index `0..N`.
    #[must_use]
    pub fn trial_history(&self) -> &[TrialV1] {
        &self.trial_history
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SessionStatusV1 {
        self.status
    }

    /// Direction of the last `Up`/`Down` move, if any.
    #[must_use]
    pub fn last_move(&self) -> Option<Direction> {
        self.last_move
    }
}
