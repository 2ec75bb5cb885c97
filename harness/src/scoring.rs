//! Per-category scoring of a trial history.
//!
//! Produces the fitting screen's six bars (percent correct per vowel
//! context and per consonant manner) and a presented → response confusion
//! table. Trials whose stimulus is not a classified VCV token count only
//! toward the overall score and the confusion table.

use std::collections::BTreeMap;

use uli_kernel::carrier::stimulus::{ConsonantManner, VowelContext};
use uli_staircase::TrialV1;

/// Correct / total counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub correct: u32,
    pub total: u32,
}

impl Tally {
    fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    /// Percent correct, or `None` with no trials.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        (self.total > 0).then(|| f64::from(self.correct) * 100.0 / f64::from(self.total))
    }

    /// Percent correct in tenths of a percent, rounded; `None` with no trials.
    #[must_use]
    pub fn permille(&self) -> Option<u32> {
        (self.total > 0).then(|| (self.correct * 1000 + self.total / 2) / self.total)
    }

    fn to_json(self) -> serde_json::Value {
        serde_json::json!({
            "correct": self.correct,
            "permille": self.permille(),
            "total": self.total,
        })
    }
}

/// Category scores for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryScoresV1 {
    pub overall: Tally,
    pub by_vowel: BTreeMap<&'static str, Tally>,
    pub by_manner: BTreeMap<&'static str, Tally>,
    /// `(presented, response label)` → count. Timeouts use `"timeout"`.
    pub confusions: BTreeMap<(String, String), u32>,
}

/// Score a trial history.
#[must_use]
pub fn score_trials(trials: &[TrialV1]) -> CategoryScoresV1 {
    let mut scores = CategoryScoresV1 {
        by_vowel: VowelContext::ALL
            .iter()
            .map(|v| (v.as_str(), Tally::default()))
            .collect(),
        by_manner: ConsonantManner::ALL
            .iter()
            .map(|m| (m.as_str(), Tally::default()))
            .collect(),
        ..CategoryScoresV1::default()
    };
    for trial in trials {
        scores.overall.record(trial.correct);
        if let Some(category) = trial.presented_stimulus.category() {
            scores
                .by_vowel
                .entry(category.vowel.as_str())
                .or_default()
                .record(trial.correct);
            scores
                .by_manner
                .entry(category.manner.as_str())
                .or_default()
                .record(trial.correct);
        }
        *scores
            .confusions
            .entry((
                trial.presented_stimulus.as_str().to_string(),
                trial.response.label().to_string(),
            ))
            .or_insert(0) += 1;
    }
    scores
}

impl CategoryScoresV1 {
    /// The six fitting bars in display order: vowels a, o, i then manners
    /// low, mid, high. Categories with no trials show 0.
    #[must_use]
    pub fn fitting_bars(&self) -> [(&'static str, f64); 6] {
        let mut bars = [("", 0.0); 6];
        let labels = VowelContext::ALL
            .iter()
            .map(|v| (v.as_str(), &self.by_vowel))
            .chain(ConsonantManner::ALL.iter().map(|m| (m.as_str(), &self.by_manner)));
        for (slot, (label, table)) in bars.iter_mut().zip(labels) {
            let pct = table.get(label).and_then(Tally::percent).unwrap_or(0.0);
            *slot = (label, pct);
        }
        bars
    }

    /// Integer-only JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let table = |m: &BTreeMap<&'static str, Tally>| -> serde_json::Value {
            serde_json::Value::Object(
                m.iter()
                    .map(|(k, t)| ((*k).to_string(), t.to_json()))
                    .collect(),
            )
        };
        let confusions: Vec<serde_json::Value> = self
            .confusions
            .iter()
            .map(|((presented, response), count)| {
                serde_json::json!({ "count": count, "presented": presented, "response": response })
            })
            .collect();
        serde_json::json!({
            "by_manner": table(&self.by_manner),
            "by_vowel": table(&self.by_vowel),
            "confusions": confusions,
            "overall": self.overall.to_json(),
        })
    }
}
