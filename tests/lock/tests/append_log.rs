//! Append-only history: summaries and tapes written by one process are
//! recovered exactly, and earlier lines are never rewritten.

use lock_tests::bundle_test_helpers::{fixture_config, fixture_listener, fixture_record};
use uli_harness::log::{append_tape, read_tape_file, ClientLog};
use uli_harness::runner::run_session;
use uli_harness::summary::SessionSummaryV1;
use uli_staircase::replay_verify;

#[test]
fn history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let first = fixture_record();
    let mut cfg = fixture_config();
    cfg.session_id = "fixture-session-2".to_string();
    cfg.selector_seed = 7;
    let second = run_session(&cfg, &mut fixture_listener()).unwrap();

    let tape_path = dir.path().join("tapes.ndjson");
    for record in [&first, &second] {
        ClientLog::new(dir.path())
            .append_summary(&SessionSummaryV1::from_record(record).unwrap())
            .unwrap();
        append_tape(&tape_path, &record.tape).unwrap();
    }

    let summaries = ClientLog::new(dir.path())
        .read_summaries(&first.config.client_id)
        .unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].session_id, "fixture-session");
    assert_eq!(summaries[1].session_id, "fixture-session-2");

    let tapes = read_tape_file(&tape_path).unwrap();
    assert_eq!(tapes.len(), 2);
    for (tape, summary) in tapes.iter().zip(&summaries) {
        assert_eq!(tape.chain_head, summary.tape_chain_head);
        assert!(replay_verify(tape).unwrap().is_match());
    }
}

#[test]
fn appending_preserves_existing_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let log = ClientLog::new(dir.path());
    let record = fixture_record();
    let summary = SessionSummaryV1::from_record(&record).unwrap();

    let path = log.append_summary(&summary).unwrap();
    let before = std::fs::read(&path).unwrap();
    log.append_summary(&summary).unwrap();
    let after = std::fs::read(&path).unwrap();

    assert!(after.starts_with(&before));
    assert_eq!(after.len(), before.len() * 2);
}

#[test]
fn other_clients_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let log = ClientLog::new(dir.path());
    log.append_summary(&SessionSummaryV1::from_record(&fixture_record()).unwrap())
        .unwrap();
    assert!(log.read_summaries("someone-else").unwrap().is_empty());
}
