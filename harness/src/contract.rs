//! Listener contract: the minimal trait a simulated or real listener must
//! implement to be driven by the session runner.
//!
//! Listeners answer trials. They may NOT touch the staircase, the tape, or
//! any hashing; those are runner and staircase concerns.

use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::carrier::stimulus::{StimulusId, StimulusSetV1};
use uli_staircase::ResponseV1;

/// The contract a listener must implement.
///
/// A listener provides:
/// - A stable identifier (recorded in the bundle envelope)
/// - One response per presented stimulus
///
/// Responses must be a member of `alternatives` or
/// [`ResponseV1::Timeout`]; anything else ends the run with
/// [`crate::runner::RunError::Staircase`].
pub trait ListenerV1 {
    /// Identifier such as `"scripted"` or `"psychometric:-8000:seed=3"`.
    fn listener_id(&self) -> String;

    /// Answer one trial: `presented` was played at `level` and the listener
    /// chooses among `alternatives`.
    fn respond(
        &mut self,
        presented: &StimulusId,
        level: SnrLevel,
        alternatives: &StimulusSetV1,
    ) -> ResponseV1;
}
