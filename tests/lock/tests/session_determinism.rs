//! Session determinism: the same config and listener seed produce the same
//! trials, tape bytes and bundle, run after run.
//!
//! N=10 in-process runs must produce identical bundle digests, artifact
//! bytes, and manifest bytes.

use lock_tests::bundle_test_helpers::{fixture_bundle, fixture_config, fixture_record};
use uli_harness::listeners::PsychometricListener;
use uli_harness::runner::run_session;

#[test]
fn bundle_digest_deterministic_n10() {
    let first = fixture_bundle();
    for i in 1..10 {
        let result = fixture_bundle();
        assert_eq!(first.digest, result.digest, "bundle digest differed on run {i}");
    }
}

#[test]
fn all_artifact_bytes_deterministic_n10() {
    let first = fixture_bundle();
    for i in 1..10 {
        let result = fixture_bundle();
        for (name, artifact) in &first.artifacts {
            let other = result
                .artifacts
                .get(name)
                .unwrap_or_else(|| panic!("missing artifact {name} on run {i}"));
            assert_eq!(
                artifact.content, other.content,
                "artifact {name} bytes differed on run {i}"
            );
        }
    }
}

#[test]
fn manifest_bytes_deterministic_n10() {
    let first = fixture_bundle();
    for i in 1..10 {
        let result = fixture_bundle();
        assert_eq!(first.manifest, result.manifest, "manifest differed on run {i}");
        assert_eq!(
            first.digest_basis, result.digest_basis,
            "digest_basis differed on run {i}"
        );
    }
}

#[test]
fn trial_history_deterministic_n10() {
    let first = fixture_record();
    for i in 1..10 {
        let result = fixture_record();
        assert_eq!(
            first.state.trial_history(),
            result.state.trial_history(),
            "trial history differed on run {i}"
        );
        assert_eq!(first.tape.bytes, result.tape.bytes, "tape differed on run {i}");
    }
}

#[test]
fn selector_seed_changes_targets_not_validity() {
    let base = fixture_config();
    let mut other = base.clone();
    other.selector_seed += 1;
    let a = run_session(&base, &mut PsychometricListener::new(-8.0, 1.5, 1)).unwrap();
    let b = run_session(&other, &mut PsychometricListener::new(-8.0, 1.5, 1)).unwrap();
    let targets = |r: &uli_harness::runner::SessionRecordV1| -> Vec<String> {
        r.state
            .trial_history()
            .iter()
            .map(|t| t.presented_stimulus.as_str().to_string())
            .collect()
    };
    assert_ne!(targets(&a), targets(&b));
    assert_ne!(a.tape.chain_head, b.tape.chain_head);
}
