//! Result sources for the non-adaptive screens.
//!
//! Diagnosis, fitting and monitoring screens display numbers that do not
//! come from a staircase session. Hosts inject a [`ResultSource`] for them;
//! [`SeededResultSource`] is a reproducible placeholder source (normal
//! draws around the normative reference, uniform integer percentages).

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::normative::{NormativeError, NormativeReferenceV1};

/// Number of fitting bars (three vowel contexts, three manner bands).
pub const FITTING_BAR_COUNT: usize = 6;

/// Pre- and post-fitting percent-correct bars, each `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FittingBarsV1 {
    pub pre: [u8; FITTING_BAR_COUNT],
    pub post: [u8; FITTING_BAR_COUNT],
}

/// Supplier of non-adaptive screen results.
pub trait ResultSource {
    /// One individual SNR for the diagnosis screen, dB.
    fn diagnosis_snr(&mut self) -> f64;

    /// Fitting screen bars.
    fn fitting_bars(&mut self) -> FittingBarsV1;

    /// `points` monitoring trend values, dB, oldest first.
    fn monitoring_trend(&mut self, points: usize) -> Vec<f64>;
}

/// Seeded placeholder source.
#[derive(Debug, Clone)]
pub struct SeededResultSource {
    rng: Xoshiro256PlusPlus,
    normal: Normal<f64>,
}

impl SeededResultSource {
    /// # Errors
    ///
    /// Returns [`NormativeError::InvalidReference`] if `reference` is not a
    /// valid normal distribution.
    pub fn new(reference: NormativeReferenceV1, seed: u64) -> Result<Self, NormativeError> {
        reference.validate()?;
        let normal = Normal::new(reference.mean_db, reference.sd_db).map_err(|e| {
            NormativeError::InvalidReference {
                detail: e.to_string(),
            }
        })?;
        Ok(Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            normal,
        })
    }
}

impl ResultSource for SeededResultSource {
    fn diagnosis_snr(&mut self) -> f64 {
        self.normal.sample(&mut self.rng)
    }

    fn fitting_bars(&mut self) -> FittingBarsV1 {
        let mut bars = FittingBarsV1 {
            pre: [0; FITTING_BAR_COUNT],
            post: [0; FITTING_BAR_COUNT],
        };
        for v in bars.pre.iter_mut().chain(bars.post.iter_mut()) {
            *v = self.rng.random_range(0..=100);
        }
        bars
    }

    fn monitoring_trend(&mut self, points: usize) -> Vec<f64> {
        (0..points).map(|_| self.normal.sample(&mut self.rng)).collect()
    }
}
