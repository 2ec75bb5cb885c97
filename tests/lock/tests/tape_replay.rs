//! Replay lock: a tape written by a live session replays to `Match`; a tape
//! whose chain is intact but whose content was rewritten replays to
//! `Divergence` at the first forged record; a damaged tape never parses.

use lock_tests::bundle_test_helpers::fixture_record;
use uli_staircase::tape::{TapeFooterV1, TapeOutput, TapeParseError};
use uli_staircase::tape_reader::read_tape;
use uli_staircase::tape_writer::TapeWriter;
use uli_staircase::{replay_verify, ReplayVerdictV1, SessionStatusV1, TrialTapeV1, TrialV1};

/// Re-chain a tape with edited trials or footer, so only replay can tell.
fn rechain(
    tape: &TrialTapeV1,
    edit_trial: impl Fn(&mut TrialV1),
    edit_footer: impl Fn(&mut TapeFooterV1),
) -> TapeOutput {
    let mut writer = TapeWriter::new(&tape.header).unwrap();
    for trial in &tape.trials {
        let mut trial = trial.clone();
        edit_trial(&mut trial);
        writer.on_trial(&trial).unwrap();
    }
    let mut footer = tape.footer.clone();
    edit_footer(&mut footer);
    writer.finish(&footer).unwrap()
}

#[test]
fn live_tape_replays_to_match() {
    let record = fixture_record();
    let tape = read_tape(&record.tape.bytes).unwrap();
    assert_eq!(tape.chain_head, record.tape.chain_head);
    assert_eq!(tape.trials, record.state.trial_history());
    assert_eq!(replay_verify(&tape).unwrap(), ReplayVerdictV1::Match);
}

#[test]
fn rechaining_unchanged_tape_is_identical() {
    let record = fixture_record();
    let tape = read_tape(&record.tape.bytes).unwrap();
    let again = rechain(&tape, |_| {}, |_| {});
    assert_eq!(again.bytes, record.tape.bytes);
    assert_eq!(again.chain_head, record.tape.chain_head);
}

#[test]
fn forged_level_diverges_at_that_trial() {
    let tape = read_tape(&fixture_record().tape.bytes).unwrap();
    let forged = rechain(
        &tape,
        |t| {
            if t.index == 3 {
                t.level_after = t.level_after.raised_by(uli_kernel::carrier::level::SnrLevel::from_millidb(500));
            }
        },
        |_| {},
    );
    let forged = read_tape(&forged.bytes).expect("forged tape still chains");
    match replay_verify(&forged).unwrap() {
        ReplayVerdictV1::Divergence { trial_index, .. } => assert_eq!(trial_index, Some(3)),
        ReplayVerdictV1::Match => panic!("forged level must diverge"),
    }
}

#[test]
fn forged_correctness_diverges() {
    let tape = read_tape(&fixture_record().tape.bytes).unwrap();
    let forged = rechain(
        &tape,
        |t| {
            if t.index == 0 {
                t.correct = !t.correct;
            }
        },
        |_| {},
    );
    let verdict = replay_verify(&read_tape(&forged.bytes).unwrap()).unwrap();
    assert!(matches!(
        verdict,
        ReplayVerdictV1::Divergence { trial_index: Some(0), .. }
    ));
}

#[test]
fn forged_footer_status_diverges_at_footer() {
    let tape = read_tape(&fixture_record().tape.bytes).unwrap();
    let forged = rechain(&tape, |_| {}, |f| f.status = SessionStatusV1::MaxTrialsReached);
    let verdict = replay_verify(&read_tape(&forged.bytes).unwrap()).unwrap();
    assert!(matches!(
        verdict,
        ReplayVerdictV1::Divergence { trial_index: None, .. }
    ));
}

#[test]
fn any_flipped_digit_fails_to_parse() {
    let bytes = fixture_record().tape.bytes;
    let digit_positions: Vec<usize> = bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| b.is_ascii_digit())
        .map(|(i, _)| i)
        .step_by(37)
        .collect();
    assert!(!digit_positions.is_empty());
    for pos in digit_positions {
        let mut damaged = bytes.clone();
        damaged[pos] = if damaged[pos] == b'0' { b'1' } else { b'0' };
        assert!(read_tape(&damaged).is_err(), "flip at byte {pos} went unnoticed");
    }
}

#[test]
fn dropped_trial_line_fails_closed() {
    let bytes = fixture_record().tape.bytes;
    let text = String::from_utf8(bytes).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    lines.remove(2);
    let joined = lines.join("\n") + "\n";
    let err = read_tape(joined.as_bytes()).unwrap_err();
    assert!(
        matches!(err, TapeParseError::ChainMismatch { .. } | TapeParseError::IndexGap { .. }),
        "got {err:?}"
    );
}
