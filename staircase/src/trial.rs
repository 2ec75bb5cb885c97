//! Trial records and response values.

use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::carrier::stimulus::StimulusId;

/// Direction of the level change a trial caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Still accumulating correct responses; level unchanged.
    None,
    /// Incorrect response; level raised by `step_up`.
    Up,
    /// `n_correct_for_down` consecutive correct responses; level lowered by
    /// `step_down`.
    Down,
}

impl Direction {
    /// Stable tag used in tapes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Inverse of [`Direction::as_str`].
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "none" => Some(Self::None),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    /// Whether this direction changes the level.
    #[must_use]
    pub const fn is_move(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listener response.
///
/// A timeout is not an error: it is scored as incorrect like any wrong
/// selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseV1 {
    Selected(StimulusId),
    Timeout,
}

impl ResponseV1 {
    /// The selected stimulus, or `None` on timeout.
    #[must_use]
    pub fn selected(&self) -> Option<&StimulusId> {
        match self {
            Self::Selected(id) => Some(id),
            Self::Timeout => None,
        }
    }

    /// Tape encoding: the token string, or JSON `null` for a timeout.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Selected(id) => serde_json::Value::String(id.as_str().to_string()),
            Self::Timeout => serde_json::Value::Null,
        }
    }

    /// Human-readable label (`"timeout"` for timeouts).
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Selected(id) => id.as_str(),
            Self::Timeout => "timeout",
        }
    }
}

/// One immutable trial record.
///
/// `presented_level` is the level the stimulus was played at;
/// `level_after` is where the staircase moved as a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialV1 {
    /// Zero-based position in the session.
    pub index: u64,
    pub presented_stimulus: StimulusId,
    pub presented_level: SnrLevel,
    pub response: ResponseV1,
    pub correct: bool,
    pub direction: Direction,
    pub level_after: SnrLevel,
    /// Whether this trial's move reversed the previous move's direction.
    pub reversal: bool,
    /// Host-supplied timestamp, milliseconds since session start.
    pub timestamp_ms: u64,
}

impl TrialV1 {
    /// Tape body for this trial (levels as integer millidecibels).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "correct": self.correct,
            "direction": self.direction.as_str(),
            "index": self.index,
            "level_after_mdb": self.level_after.millidb(),
            "presented": self.presented_stimulus.as_str(),
            "presented_level_mdb": self.presented_level.millidb(),
            "response": self.response.to_json(),
            "reversal": self.reversal,
            "timestamp_ms": self.timestamp_ms,
        })
    }
}
