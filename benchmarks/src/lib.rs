//! Shared helpers for ULI benchmark suites.

use uli_harness::config::SessionConfigV1;
use uli_harness::listeners::PsychometricListener;
use uli_harness::runner::{run_session, SessionRecordV1};
use uli_kernel::carrier::stimulus::StimulusSetV1;
use uli_staircase::{ResponseV1, SeededSelector, StaircaseController, StaircasePolicyV1};

/// Policy that never converges within `trials`, so every submitted trial
/// walks the full update path.
#[must_use]
pub fn long_policy(trials: u32) -> StaircasePolicyV1 {
    StaircasePolicyV1 {
        max_trials: trials,
        min_reversals_for_convergence: trials,
        ..StaircasePolicyV1::default()
    }
}

/// Drive a keypad session for `trials` trials with a fixed response
/// pattern: two correct, then one wrong.
///
/// # Panics
///
/// Panics if the controller rejects the policy or a response. Benchmark
/// setup failures are fatal.
#[must_use]
pub fn drive_controller(trials: u32, seed: u64) -> StaircaseController<SeededSelector> {
    let keypad = StimulusSetV1::keypad();
    let mut controller =
        StaircaseController::start(long_policy(trials), keypad.clone(), SeededSelector::new(seed))
            .expect("valid benchmark policy");
    for i in 0..u64::from(trials) {
        let target = controller.next_stimulus().expect("session running");
        let response = if i % 3 == 2 {
            keypad
                .iter()
                .find(|id| **id != target)
                .cloned()
                .map_or(ResponseV1::Timeout, ResponseV1::Selected)
        } else {
            ResponseV1::Selected(target.clone())
        };
        controller
            .submit_response(&target, response, i * 2_500)
            .expect("response in set");
    }
    controller
}

/// One full harness session against a psychometric listener.
///
/// # Panics
///
/// Panics if the run fails.
#[must_use]
pub fn psychometric_session(seed: u64) -> SessionRecordV1 {
    let mut config = SessionConfigV1::new("bench-session", "bench-client").expect("valid ids");
    config.selector_seed = seed;
    config.policy.max_trials = 200;
    run_session(&config, &mut PsychometricListener::new(-8.0, 1.5, seed))
        .expect("benchmark session should run")
}
