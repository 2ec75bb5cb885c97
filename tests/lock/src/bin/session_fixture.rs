//! Binary that runs the standard fixture session through the harness and
//! prints deterministic output lines for cross-process verification.
//!
//! Logs go to stderr through `tracing-subscriber`; stdout carries only the
//! `key=value` lines below, so it can be compared byte-for-byte.
//!
//! Usage: `session_fixture`
//! Output: seven lines, each `key=value`:
//!   `bundle_digest`=sha256:...
//!   `tape_chain_head`=sha256:...
//!   `policy_digest`=sha256:...
//!   `status`=converged|max_trials_reached|...
//!   `trial_count`=N
//!   `estimate_mdb`=N|none
//!   `artifact_count`=7

use lock_tests::bundle_test_helpers::fixture_record;
use uli_harness::bundle::{build_session_bundle, verify_bundle_with_profile, VerificationProfile};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let record = fixture_record();
    let bundle = build_session_bundle(&record).expect("bundle assembly failed");
    verify_bundle_with_profile(&bundle, VerificationProfile::Cert)
        .expect("fixture bundle failed cert verification");

    let estimate = record
        .partial_estimate
        .and_then(uli_kernel::carrier::level::SnrLevel::from_db)
        .map_or_else(|| "none".to_string(), |l| l.millidb().to_string());

    println!("bundle_digest={}", bundle.digest.as_str());
    println!("tape_chain_head={}", record.tape.chain_head.as_str());
    println!(
        "policy_digest={}",
        record.config.policy.digest().expect("policy digest").as_str()
    );
    println!("status={}", record.status().as_str());
    println!("trial_count={}", record.state.trial_history().len());
    println!("estimate_mdb={estimate}");
    println!("artifact_count={}", bundle.artifacts.len());
}
