//! Shared test helpers for running standard sessions and rebuilding bundles.
//!
//! The rebuild helpers keep the bundle digest consistent when an artifact is
//! replaced, so negative tests exercise the semantic binding they target
//! instead of tripping the content-hash check first.

use uli_harness::bundle::{build_bundle, build_session_bundle, ArtifactBundleV1};
use uli_harness::config::SessionConfigV1;
use uli_harness::listeners::PsychometricListener;
use uli_harness::runner::{run_session, SessionRecordV1};
use uli_kernel::proof::canon::canonical_json_bytes;

/// Session id, client id and seeds of the standard fixture session.
pub const FIXTURE_SESSION_ID: &str = "fixture-session";
pub const FIXTURE_CLIENT_ID: &str = "fixture-client";
pub const FIXTURE_SEED: u64 = 42;

/// Default policy with room to converge.
///
/// # Panics
///
/// Panics if the fixture ids are invalid (test-only invariant).
#[must_use]
pub fn fixture_config() -> SessionConfigV1 {
    let mut config = SessionConfigV1::new(FIXTURE_SESSION_ID, FIXTURE_CLIENT_ID).unwrap();
    config.selector_seed = FIXTURE_SEED;
    config.policy.max_trials = 200;
    config
}

/// Listener whose threshold sits on the normative mean.
#[must_use]
pub fn fixture_listener() -> PsychometricListener {
    PsychometricListener::new(-8.0, 1.5, FIXTURE_SEED)
}

/// Run the standard fixture session.
///
/// # Panics
///
/// Panics if the run fails (test-only invariant).
#[must_use]
pub fn fixture_record() -> SessionRecordV1 {
    run_session(&fixture_config(), &mut fixture_listener()).unwrap()
}

/// Bundle of the standard fixture session.
///
/// # Panics
///
/// Panics if the run or bundle assembly fails (test-only invariant).
#[must_use]
pub fn fixture_bundle() -> ArtifactBundleV1 {
    build_session_bundle(&fixture_record()).unwrap()
}

/// Rebuild `bundle` with artifact `name` replaced by `content`.
///
/// # Panics
///
/// Panics if `name` is not in the bundle.
#[must_use]
pub fn rebuild_with_replaced(
    bundle: &ArtifactBundleV1,
    name: &str,
    content: Vec<u8>,
) -> ArtifactBundleV1 {
    assert!(bundle.artifacts.contains_key(name), "no artifact {name}");
    let inputs: Vec<(String, Vec<u8>, bool)> = bundle
        .artifacts
        .values()
        .map(|a| {
            let bytes = if a.name == name {
                content.clone()
            } else {
                a.content.clone()
            };
            (a.name.clone(), bytes, a.normative)
        })
        .collect();
    build_bundle(inputs).unwrap()
}

/// Rebuild `bundle` after editing a JSON artifact in place.
///
/// # Panics
///
/// Panics if the artifact is missing or not valid JSON.
#[must_use]
pub fn rebuild_with_modified_json(
    bundle: &ArtifactBundleV1,
    name: &str,
    modify: impl FnOnce(&mut serde_json::Value),
) -> ArtifactBundleV1 {
    let mut json: serde_json::Value =
        serde_json::from_slice(&bundle.artifacts[name].content).unwrap();
    modify(&mut json);
    rebuild_with_replaced(bundle, name, canonical_json_bytes(&json).unwrap())
}

/// Rebuild `bundle` without artifact `name`.
///
/// # Panics
///
/// Panics if assembly fails (test-only invariant).
#[must_use]
pub fn rebuild_without_artifact(bundle: &ArtifactBundleV1, name: &str) -> ArtifactBundleV1 {
    let inputs: Vec<(String, Vec<u8>, bool)> = bundle
        .artifacts
        .values()
        .filter(|a| a.name != name)
        .map(|a| (a.name.clone(), a.content.clone(), a.normative))
        .collect();
    build_bundle(inputs).unwrap()
}
