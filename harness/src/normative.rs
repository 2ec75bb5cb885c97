//! Screener normative comparison.
//!
//! Places a threshold estimate under the normative SNR distribution
//! `N(mean, sd)` and samples the normative density over a plotting range.
//! Everything that reaches a bundle is fixed-point: levels in millidecibels,
//! probabilities and densities in parts per million.

use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use uli_kernel::carrier::level::SnrLevel;

/// Normative mean SNR for normal-hearing listeners, dB.
pub const DEFAULT_NORMATIVE_MEAN_DB: f64 = -8.0;
/// Normative SNR standard deviation, dB.
pub const DEFAULT_NORMATIVE_SD_DB: f64 = 1.6;
/// Density plot range, dB.
pub const DEFAULT_CURVE_RANGE_DB: (f64, f64) = (-15.0, 5.0);
/// Density plot sample count.
pub const DEFAULT_CURVE_POINTS: usize = 100;

/// Schema tag of the comparison artifact.
pub const NORMATIVE_SCHEMA_VERSION: &str = "normative_comparison.v1";

const PPM: f64 = 1_000_000.0;

/// Error constructing or evaluating a normative reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormativeError {
    /// Mean not finite or standard deviation not strictly positive.
    InvalidReference { detail: String },
    /// Curve range inverted or fewer than two points.
    InvalidCurve { detail: String },
}

impl std::fmt::Display for NormativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidReference { detail } => write!(f, "invalid normative reference: {detail}"),
            Self::InvalidCurve { detail } => write!(f, "invalid density curve: {detail}"),
        }
    }
}

impl std::error::Error for NormativeError {}

/// The normative distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormativeReferenceV1 {
    pub mean_db: f64,
    pub sd_db: f64,
}

impl Default for NormativeReferenceV1 {
    fn default() -> Self {
        Self {
            mean_db: DEFAULT_NORMATIVE_MEAN_DB,
            sd_db: DEFAULT_NORMATIVE_SD_DB,
        }
    }
}

/// Where an estimate sits under the reference.
#[derive(Debug, Clone, PartialEq)]
pub struct NormativeComparisonV1 {
    pub reference: NormativeReferenceV1,
    pub estimate_db: f64,
    /// `P(X <= estimate)` under the reference.
    pub cdf: f64,
    /// `(estimate - mean) / sd`.
    pub z_score: f64,
    /// `(level_db, density)` samples for plotting.
    pub curve: Vec<(f64, f64)>,
}

impl NormativeReferenceV1 {
    fn distribution(&self) -> Result<Normal, NormativeError> {
        if !self.mean_db.is_finite() || !(self.sd_db.is_finite() && self.sd_db > 0.0) {
            return Err(NormativeError::InvalidReference {
                detail: format!("mean {} dB, sd {} dB", self.mean_db, self.sd_db),
            });
        }
        Normal::new(self.mean_db, self.sd_db).map_err(|e| NormativeError::InvalidReference {
            detail: e.to_string(),
        })
    }

    /// Check the reference parameters.
    ///
    /// # Errors
    ///
    /// Returns [`NormativeError::InvalidReference`] for a non-finite mean or
    /// a non-positive standard deviation.
    pub fn validate(&self) -> Result<(), NormativeError> {
        self.distribution().map(|_| ())
    }

    /// `P(X <= level_db)`.
    ///
    /// # Errors
    ///
    /// Returns [`NormativeError::InvalidReference`] for a bad reference.
    pub fn cdf(&self, level_db: f64) -> Result<f64, NormativeError> {
        Ok(self.distribution()?.cdf(level_db))
    }

    /// Density sampled at `points` evenly spaced levels over `[lo, hi]`,
    /// endpoints included.
    ///
    /// # Errors
    ///
    /// Returns [`NormativeError`] for a bad reference, `lo >= hi`, or fewer
    /// than two points.
    pub fn density_curve(
        &self,
        (lo, hi): (f64, f64),
        points: usize,
    ) -> Result<Vec<(f64, f64)>, NormativeError> {
        let dist = self.distribution()?;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) || points < 2 {
            return Err(NormativeError::InvalidCurve {
                detail: format!("range [{lo}, {hi}] with {points} points"),
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let step = (hi - lo) / (points - 1) as f64;
        Ok((0..points)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let x = lo + step * i as f64;
                (x, dist.pdf(x))
            })
            .collect())
    }

    /// Compare an estimate against this reference, with the default curve.
    ///
    /// # Errors
    ///
    /// Returns [`NormativeError`] for a bad reference or a non-finite
    /// estimate.
    pub fn compare(&self, estimate_db: f64) -> Result<NormativeComparisonV1, NormativeError> {
        if !estimate_db.is_finite() {
            return Err(NormativeError::InvalidReference {
                detail: format!("estimate {estimate_db} is not finite"),
            });
        }
        let cdf = self.cdf(estimate_db)?;
        let curve = self.density_curve(DEFAULT_CURVE_RANGE_DB, DEFAULT_CURVE_POINTS)?;
        Ok(NormativeComparisonV1 {
            reference: *self,
            estimate_db,
            cdf,
            z_score: (estimate_db - self.mean_db) / self.sd_db,
            curve,
        })
    }
}

impl NormativeReferenceV1 {
    /// Fixed-point JSON of the reference alone.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "mean_mdb": millidb(self.mean_db),
            "sd_mdb": millidb(self.sd_db),
        })
    }
}

/// Bundle artifact body: the comparison when an estimate exists, otherwise
/// the reference with a null estimate.
#[must_use]
pub fn comparison_json(
    reference: &NormativeReferenceV1,
    comparison: Option<&NormativeComparisonV1>,
) -> serde_json::Value {
    comparison.map_or_else(
        || {
            serde_json::json!({
                "cdf_ppm": null,
                "curve": [],
                "estimate_mdb": null,
                "reference": reference.to_json(),
                "schema_version": NORMATIVE_SCHEMA_VERSION,
                "z_milli": null,
            })
        },
        NormativeComparisonV1::to_json,
    )
}

impl NormativeComparisonV1 {
    /// Fixed-point JSON for bundles: levels in millidecibels, probabilities
    /// and densities in parts per million.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let curve: Vec<serde_json::Value> = self
            .curve
            .iter()
            .map(|(x, d)| serde_json::json!({ "density_ppm": ppm(*d), "level_mdb": millidb(*x) }))
            .collect();
        serde_json::json!({
            "cdf_ppm": ppm(self.cdf),
            "curve": curve,
            "estimate_mdb": millidb(self.estimate_db),
            "reference": self.reference.to_json(),
            "schema_version": NORMATIVE_SCHEMA_VERSION,
            "z_milli": millidb(self.z_score),
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn ppm(x: f64) -> i64 {
    (x * PPM).round() as i64
}

/// Round decibels (or any value) to thousandths; non-representable values
/// collapse to zero.
fn millidb(x: f64) -> i64 {
    SnrLevel::from_db(x).map_or(0, SnrLevel::millidb)
}
