//! `ScriptedListener`: answers from a fixed correct/incorrect/timeout script.

use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::carrier::stimulus::{StimulusId, StimulusSetV1};
use uli_staircase::ResponseV1;

use crate::contract::ListenerV1;

/// One scripted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    /// Select the presented stimulus.
    Correct,
    /// Select the first alternative (in set order) that is not the
    /// presented stimulus.
    Incorrect,
    /// No selection.
    Timeout,
}

impl ScriptStep {
    /// Parse a compact script such as `"cci t"`: `c` correct, `i` incorrect,
    /// `t` timeout. Whitespace is ignored; any other character is rejected.
    #[must_use]
    pub fn parse_script(script: &str) -> Option<Vec<Self>> {
        script
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                'c' => Some(Self::Correct),
                'i' => Some(Self::Incorrect),
                't' => Some(Self::Timeout),
                _ => None,
            })
            .collect()
    }
}

/// Deterministic listener driven by a script. Once the script is exhausted
/// every further trial times out.
#[derive(Debug, Clone)]
pub struct ScriptedListener {
    script: Vec<ScriptStep>,
    cursor: usize,
}

impl ScriptedListener {
    #[must_use]
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self { script, cursor: 0 }
    }

    /// `n` correct answers followed by `m` incorrect ones.
    #[must_use]
    pub fn correct_then_incorrect(n: usize, m: usize) -> Self {
        let mut script = vec![ScriptStep::Correct; n];
        script.extend(vec![ScriptStep::Incorrect; m]);
        Self::new(script)
    }

    /// Steps consumed so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl ListenerV1 for ScriptedListener {
    fn listener_id(&self) -> String {
        format!("scripted:{}", self.script.len())
    }

    fn respond(
        &mut self,
        presented: &StimulusId,
        _level: SnrLevel,
        alternatives: &StimulusSetV1,
    ) -> ResponseV1 {
        let step = self
            .script
            .get(self.cursor)
            .copied()
            .unwrap_or(ScriptStep::Timeout);
        self.cursor += 1;
        match step {
            ScriptStep::Correct => ResponseV1::Selected(presented.clone()),
            ScriptStep::Incorrect => alternatives
                .iter()
                .find(|s| *s != presented)
                .map_or(ResponseV1::Timeout, |s| ResponseV1::Selected(s.clone())),
            ScriptStep::Timeout => ResponseV1::Timeout,
        }
    }
}
