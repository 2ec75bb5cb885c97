//! `SnrLevel`: fixed-point signal-to-noise ratio in integer millidecibels.
//!
//! Every level that reaches a hashed artifact is an integer, so trial tapes
//! are bit-reproducible across platforms. Conversion to and from `f64`
//! decibels happens only at the host boundary.

/// Largest accepted magnitude: ±1000 dB. Anything beyond is a unit error.
pub const MAX_ABS_MILLIDB: i64 = 1_000_000;

/// Millidecibels per decibel.
const MILLIDB_PER_DB: i64 = 1000;

/// A signal-to-noise ratio level, stored as integer millidecibels.
///
/// Ordering is numeric: `-20 dB < -8 dB < 5 dB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SnrLevel(i64);

impl SnrLevel {
    /// 0 dB.
    pub const ZERO: Self = Self(0);

    /// Construct from integer millidecibels.
    #[must_use]
    pub const fn from_millidb(millidb: i64) -> Self {
        Self(millidb)
    }

    /// Construct from decibels, rounding to the nearest millidecibel.
    ///
    /// Returns `None` for NaN, infinities, or magnitudes above
    /// [`MAX_ABS_MILLIDB`].
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn from_db(db: f64) -> Option<Self> {
        if !db.is_finite() {
            return None;
        }
        let scaled = (db * MILLIDB_PER_DB as f64).round();
        if scaled.abs() > MAX_ABS_MILLIDB as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    /// Raw millidecibel value.
    #[must_use]
    pub const fn millidb(self) -> i64 {
        self.0
    }

    /// Level in decibels.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_db(self) -> f64 {
        self.0 as f64 / MILLIDB_PER_DB as f64
    }

    /// `self + step`, saturating at the `i64` range.
    #[must_use]
    pub const fn raised_by(self, step: Self) -> Self {
        Self(self.0.saturating_add(step.0))
    }

    /// `self - step`, saturating at the `i64` range.
    #[must_use]
    pub const fn lowered_by(self, step: Self) -> Self {
        Self(self.0.saturating_sub(step.0))
    }

    /// Clamp into `[floor, ceiling]`.
    ///
    /// Unlike [`Ord::clamp`] this never panics: if the bounds are inverted
    /// the floor wins. Policy validation rejects inverted bounds before any
    /// session starts.
    #[must_use]
    pub fn clamped(self, floor: Self, ceiling: Self) -> Self {
        if self < floor {
            floor
        } else if self > ceiling {
            ceiling.max(floor)
        } else {
            self
        }
    }

    /// Whether this level lies in `[floor, ceiling]`.
    #[must_use]
    pub fn within(self, floor: Self, ceiling: Self) -> bool {
        floor <= self && self <= ceiling
    }

    /// Whether this level is strictly positive (a usable step size).
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for SnrLevel {
    /// Renders exact fixed-point decibels, e.g. `-8.000 dB`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let whole = magnitude / 1000;
        let frac = magnitude % 1000;
        write!(f, "{sign}{whole}.{frac:03} dB")
    }
}
