//! Midpoint-of-reversals threshold estimator.

use uli_kernel::carrier::level::SnrLevel;

/// Mean of the last `window` reversal levels, in decibels.
///
/// Uses every reversal when fewer than `window` exist. Returns `None` when
/// there are no reversals or `window` is zero.
#[must_use]
pub fn midpoint_estimate(reversal_levels: &[SnrLevel], window: usize) -> Option<f64> {
    if window == 0 || reversal_levels.is_empty() {
        return None;
    }
    let start = reversal_levels.len().saturating_sub(window);
    let tail = &reversal_levels[start..];
    // Sum in integer millidecibels so the result is independent of
    // accumulation order.
    let sum: i128 = tail.iter().map(|l| i128::from(l.millidb())).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean_millidb = sum as f64 / tail.len() as f64;
    Some(mean_millidb / 1000.0)
}
