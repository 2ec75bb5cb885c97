//! Session bundle integrity: the fixture bundle verifies under both
//! profiles, and every binding between tape, policy snapshot, stimulus set
//! and summary fails closed when broken.

use lock_tests::bundle_test_helpers::{
    fixture_bundle, rebuild_with_modified_json, rebuild_with_replaced, rebuild_without_artifact,
};
use uli_harness::bundle::{
    verify_bundle, verify_bundle_with_profile, BundleVerifyError, VerificationProfile,
    ARTIFACT_ENVELOPE, ARTIFACT_POLICY_SNAPSHOT, ARTIFACT_SESSION_SUMMARY, ARTIFACT_STIMULUS_SET,
    ARTIFACT_TRIAL_TAPE,
};
use uli_harness::config::SessionConfigV1;
use uli_harness::listeners::PsychometricListener;
use uli_harness::runner::run_session;
use uli_kernel::carrier::stimulus::StimulusSetV1;
use uli_kernel::proof::canon::canonical_json_bytes;

#[test]
fn fixture_bundle_verifies() {
    let bundle = fixture_bundle();
    assert_eq!(bundle.artifacts.len(), 7);
    verify_bundle(&bundle).unwrap();
    verify_bundle_with_profile(&bundle, VerificationProfile::Cert).unwrap();
}

#[test]
fn only_envelope_is_observational() {
    let bundle = fixture_bundle();
    for artifact in bundle.artifacts.values() {
        assert_eq!(
            artifact.normative,
            artifact.name != ARTIFACT_ENVELOPE,
            "{} normative flag",
            artifact.name
        );
    }
}

#[test]
fn stored_digest_tamper_detected() {
    let mut bundle = fixture_bundle();
    bundle.digest = uli_kernel::proof::hash::canonical_hash(
        uli_kernel::proof::hash_domain::HashDomain::BundleDigest,
        b"not the basis",
    );
    assert!(matches!(
        verify_bundle(&bundle),
        Err(BundleVerifyError::DigestMismatch { .. })
    ));
}

#[test]
fn manifest_tamper_detected() {
    let mut bundle = fixture_bundle();
    bundle.manifest.push(b' ');
    assert_eq!(verify_bundle(&bundle), Err(BundleVerifyError::ManifestMismatch));
}

#[test]
fn non_canonical_summary_rejected() {
    let bundle = fixture_bundle();
    let mut pretty = serde_json::to_vec_pretty(
        &serde_json::from_slice::<serde_json::Value>(
            &bundle.artifacts[ARTIFACT_SESSION_SUMMARY].content,
        )
        .unwrap(),
    )
    .unwrap();
    pretty.push(b'\n');
    let forged = rebuild_with_replaced(&bundle, ARTIFACT_SESSION_SUMMARY, pretty);
    assert!(matches!(
        verify_bundle(&forged),
        Err(BundleVerifyError::ArtifactNotCanonical { .. })
    ));
}

#[test]
fn summary_chain_head_binding() {
    let bundle = fixture_bundle();
    let forged = rebuild_with_modified_json(&bundle, ARTIFACT_SESSION_SUMMARY, |s| {
        s["tape_chain_head"] = serde_json::json!(
            "sha256:0000000000000000000000000000000000000000000000000000000000000000"
        );
    });
    assert!(matches!(
        verify_bundle(&forged),
        Err(BundleVerifyError::ChainHeadMismatch { .. })
    ));
}

#[test]
fn summary_policy_digest_binding() {
    let bundle = fixture_bundle();
    let forged = rebuild_with_modified_json(&bundle, ARTIFACT_SESSION_SUMMARY, |s| {
        s["policy_digest"] = serde_json::json!(
            "sha256:1111111111111111111111111111111111111111111111111111111111111111"
        );
    });
    assert!(matches!(
        verify_bundle(&forged),
        Err(BundleVerifyError::PolicyDigestMismatch { .. })
    ));
}

#[test]
fn summary_identity_and_outcome_bindings() {
    let bundle = fixture_bundle();
    for (field, value) in [
        ("session_id", serde_json::json!("other-session")),
        ("client_id", serde_json::json!("other-client")),
        ("status", serde_json::json!("aborted")),
        ("trial_count", serde_json::json!(1)),
    ] {
        let forged = rebuild_with_modified_json(&bundle, ARTIFACT_SESSION_SUMMARY, |s| {
            s[field] = value.clone();
        });
        match verify_bundle(&forged) {
            Err(BundleVerifyError::TapeBindingMismatch { field: got, .. }) => {
                assert_eq!(got, field);
            }
            other => panic!("{field}: expected binding mismatch, got {other:?}"),
        }
    }
}

#[test]
fn stimulus_set_binding() {
    let bundle = fixture_bundle();
    let other = StimulusSetV1::from_tokens(["aka", "obo"]).unwrap();
    let forged = rebuild_with_replaced(
        &bundle,
        ARTIFACT_STIMULUS_SET,
        canonical_json_bytes(&other.to_json()).unwrap(),
    );
    assert!(matches!(
        verify_bundle(&forged),
        Err(BundleVerifyError::TapeBindingMismatch { field: "stimulus_set", .. })
    ));
}

#[test]
fn tape_from_another_session_rejected() {
    let bundle = fixture_bundle();
    let mut cfg = SessionConfigV1::new("intruder", "fixture-client").unwrap();
    cfg.policy.max_trials = 200;
    let other = run_session(&cfg, &mut PsychometricListener::new(-6.0, 1.0, 9)).unwrap();
    let forged = rebuild_with_replaced(&bundle, ARTIFACT_TRIAL_TAPE, other.tape.bytes);
    assert!(verify_bundle(&forged).is_err());
}

#[test]
fn missing_policy_snapshot_rejected_when_tape_present() {
    let bundle = fixture_bundle();
    let forged = rebuild_without_artifact(&bundle, ARTIFACT_POLICY_SNAPSHOT);
    assert_eq!(
        verify_bundle(&forged),
        Err(BundleVerifyError::ArtifactMissing {
            artifact: ARTIFACT_POLICY_SNAPSHOT
        })
    );
}

#[test]
fn cert_profile_requires_tape() {
    let bundle = rebuild_without_artifact(&fixture_bundle(), ARTIFACT_TRIAL_TAPE);
    verify_bundle(&bundle).unwrap();
    assert_eq!(
        verify_bundle_with_profile(&bundle, VerificationProfile::Cert),
        Err(BundleVerifyError::TapeMissing)
    );
}
