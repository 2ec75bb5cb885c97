//! `PsychometricListener`: a seeded simulated listener whose probability
//! of a correct answer follows a logistic psychometric function of SNR.
//!
//! ```text
//! p(correct | level) = γ + (1 − γ) / (1 + exp(−slope · (level − threshold)))
//! ```
//!
//! `γ = 1 / n` is the guess rate for an `n`-alternative forced choice. A
//! wrong answer is drawn uniformly from the other alternatives.

use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution};
use rand_xoshiro::Xoshiro256PlusPlus;
use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::carrier::stimulus::{StimulusId, StimulusSetV1};
use uli_staircase::ResponseV1;

use crate::contract::ListenerV1;

#[derive(Debug, Clone)]
pub struct PsychometricListener {
    /// Midpoint of the logistic, dB SNR.
    threshold_db: f64,
    /// Logistic slope, per dB.
    slope_per_db: f64,
    seed: u64,
    rng: Xoshiro256PlusPlus,
}

impl PsychometricListener {
    #[must_use]
    pub fn new(threshold_db: f64, slope_per_db: f64, seed: u64) -> Self {
        Self {
            threshold_db,
            slope_per_db,
            seed,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Probability of a correct answer at `level` among `alternatives` choices.
    #[must_use]
    pub fn p_correct(&self, level: SnrLevel, alternatives: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let guess = if alternatives == 0 {
            0.0
        } else {
            1.0 / alternatives as f64
        };
        let x = self.slope_per_db * (level.as_db() - self.threshold_db);
        let p = guess + (1.0 - guess) / (1.0 + (-x).exp());
        if p.is_finite() {
            p.clamp(0.0, 1.0)
        } else {
            guess
        }
    }
}

impl ListenerV1 for PsychometricListener {
    fn listener_id(&self) -> String {
        format!(
            "psychometric:threshold={}:slope={}:seed={}",
            self.threshold_db, self.slope_per_db, self.seed
        )
    }

    fn respond(
        &mut self,
        presented: &StimulusId,
        level: SnrLevel,
        alternatives: &StimulusSetV1,
    ) -> ResponseV1 {
        let p = self.p_correct(level, alternatives.len());
        let correct = Bernoulli::new(p).is_ok_and(|b| b.sample(&mut self.rng));
        if correct {
            return ResponseV1::Selected(presented.clone());
        }
        let wrong: Vec<&StimulusId> = alternatives.iter().filter(|s| *s != presented).collect();
        if wrong.is_empty() {
            return ResponseV1::Timeout;
        }
        let pick = self.rng.random_range(0..wrong.len());
        ResponseV1::Selected(wrong[pick].clone())
    }
}
