//! Staircase behaviour locked end to end: scripted listeners driven through
//! the runner, with every tape replayed.

use uli_harness::config::SessionConfigV1;
use uli_harness::listeners::{ScriptStep, ScriptedListener};
use uli_harness::runner::{run_session, SessionEndV1, SessionRecordV1};
use uli_kernel::carrier::level::SnrLevel;
use uli_staircase::tape_reader::read_tape;
use uli_staircase::{replay_verify, Direction, ResponseV1, SessionStatusV1};

fn mdb(db: i64) -> SnrLevel {
    SnrLevel::from_millidb(db * 1_000)
}

fn run(config: &SessionConfigV1, script: &str) -> SessionRecordV1 {
    let steps = ScriptStep::parse_script(script).expect("valid script");
    let record = run_session(config, &mut ScriptedListener::new(steps)).expect("run");
    let tape = read_tape(&record.tape.bytes).expect("tape parses");
    assert!(replay_verify(&tape).expect("replay runs").is_match());
    record
}

fn config() -> SessionConfigV1 {
    let mut config = SessionConfigV1::new("scenario", "client-s").unwrap();
    config.stimulus_set =
        uli_kernel::carrier::stimulus::StimulusSetV1::from_tokens(["aka", "obo", "ili"]).unwrap();
    config
}

#[test]
fn ten_correct_then_ten_incorrect() {
    let mut cfg = config();
    cfg.policy.min_reversals_for_convergence = 4;
    cfg.abort_after_trials = Some(20);
    let record = run(&cfg, "cccccccccc iiiiiiiiii");
    let trials = record.state.trial_history();
    assert_eq!(trials.len(), 20);
    assert_eq!(record.end, SessionEndV1::AbortedByHost { after_trials: 20 });

    // Down 1 dB on every second correct answer.
    for (i, t) in trials[..10].iter().enumerate() {
        let expected = if i % 2 == 1 { Direction::Down } else { Direction::None };
        assert_eq!(t.direction, expected, "trial {i}");
    }
    assert_eq!(trials[9].level_after, mdb(-13));

    // Up 2 dB on every incorrect answer, clamped at the ceiling.
    let after: Vec<SnrLevel> = trials[10..].iter().map(|t| t.level_after).collect();
    assert_eq!(
        after,
        vec![mdb(-11), mdb(-9), mdb(-7), mdb(-5), mdb(-3), mdb(-1), mdb(1), mdb(3), mdb(5), mdb(5)]
    );

    // One reversal, on the first incorrect answer, at the level it left.
    let reversals: Vec<u64> = trials.iter().filter(|t| t.reversal).map(|t| t.index).collect();
    assert_eq!(reversals, vec![10]);
    assert_eq!(record.state.reversal_levels(), &[mdb(-13)]);
}

#[test]
fn converges_exactly_at_sixth_reversal() {
    let record = run(&config(), "cci cci cci cci");
    assert_eq!(record.end, SessionEndV1::Converged);
    assert_eq!(record.status(), SessionStatusV1::Converged);
    let trials = record.state.trial_history();
    assert_eq!(trials.len(), 11);
    assert!(trials.last().is_some_and(|t| t.reversal));
    assert_eq!(trials.iter().filter(|t| t.reversal).count(), 6);
    assert_eq!(
        record.state.reversal_levels(),
        &[mdb(-9), mdb(-7), mdb(-8), mdb(-6), mdb(-7), mdb(-5)]
    );
    let estimate = record.final_estimate.expect("converged estimate");
    assert!((estimate - -7.0).abs() < 1e-9);
}

#[test]
fn all_correct_walks_to_floor_without_reversals() {
    let record = run(&config(), &"c".repeat(60));
    assert_eq!(record.end, SessionEndV1::MaxTrialsReached);
    let trials = record.state.trial_history();
    assert_eq!(trials.len(), 50);
    assert!(trials.iter().all(|t| !t.reversal));
    assert!(trials
        .iter()
        .all(|t| t.level_after.within(mdb(-20), mdb(5))));
    assert_eq!(record.state.current_level(), mdb(-20));
    assert_eq!(record.final_estimate, None);
    assert_eq!(record.partial_estimate, None);
}

#[test]
fn indices_are_dense_and_ordered() {
    let record = run(&config(), "cictcitccitcc");
    for (i, t) in record.state.trial_history().iter().enumerate() {
        assert_eq!(t.index, i as u64);
    }
}

#[test]
fn timeout_counts_as_incorrect() {
    let mut cfg = config();
    cfg.abort_after_trials = Some(3);
    let record = run(&cfg, "cct");
    let last = &record.state.trial_history()[2];
    assert_eq!(last.response, ResponseV1::Timeout);
    assert!(!last.correct);
    assert_eq!(last.direction, Direction::Up);
    assert!(last.reversal);
}

#[test]
fn targets_never_repeat_back_to_back() {
    let mut cfg = config();
    cfg.policy.max_trials = 1_000;
    cfg.policy.min_reversals_for_convergence = 1_000;
    let record = run(&cfg, &"ci".repeat(500));
    let trials = record.state.trial_history();
    assert_eq!(trials.len(), 1_000);
    for pair in trials.windows(2) {
        assert_ne!(pair[0].presented_stimulus, pair[1].presented_stimulus);
    }
}
