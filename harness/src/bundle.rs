//! In-memory artifact bundle: the output of a session run.
//!
//! No file I/O in this module. The bundle is a deterministic in-memory
//! representation that can be inspected programmatically.
//!
//! # Normative vs observational artifacts
//!
//! Each artifact is tagged `normative` (participates in bundle digest)
//! or observational (present in the manifest but excluded from digest).
//!
//! `envelope.json` is observational: it names the harness build and the
//! listener, neither of which changes what the session proves.
//!
//! The bundle digest is computed over the **digest basis**: a canonical
//! JSON projection of normative artifact hashes only.

use std::collections::BTreeMap;

use uli_kernel::proof::canon::canonical_json_bytes;
use uli_kernel::proof::hash::{canonical_hash, ContentHash, HashDomain};
use uli_staircase::policy::DOMAIN_POLICY_SNAPSHOT;
use uli_staircase::tape_reader::read_tape;
use uli_staircase::{replay_verify, ReplayVerdictV1, TrialTapeV1};

use crate::normative::comparison_json;
use crate::runner::SessionRecordV1;
use crate::summary::SessionSummaryV1;

/// Domain prefix for bundle artifact content hashing.
pub const DOMAIN_BUNDLE_ARTIFACT: HashDomain = HashDomain::BundleArtifact;

/// Domain prefix for bundle digest computation.
pub const DOMAIN_BUNDLE_DIGEST: HashDomain = HashDomain::BundleDigest;

pub const ARTIFACT_POLICY_SNAPSHOT: &str = "policy_snapshot.json";
pub const ARTIFACT_STIMULUS_SET: &str = "stimulus_set.json";
pub const ARTIFACT_TRIAL_TAPE: &str = "trial_tape.ndjson";
pub const ARTIFACT_SESSION_SUMMARY: &str = "session_summary.json";
pub const ARTIFACT_NORMATIVE_COMPARISON: &str = "normative_comparison.json";
pub const ARTIFACT_CATEGORY_SCORES: &str = "category_scores.json";
pub const ARTIFACT_ENVELOPE: &str = "envelope.json";

/// A single artifact in the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleArtifact {
    /// Logical filename (e.g., `"policy_snapshot.json"`).
    pub name: String,
    /// Raw bytes of the artifact.
    pub content: Vec<u8>,
    /// Content hash: `canonical_hash(DOMAIN_BUNDLE_ARTIFACT, content)`.
    pub content_hash: ContentHash,
    /// Whether this artifact participates in the bundle digest.
    pub normative: bool,
}

/// The complete artifact bundle from a session run.
///
/// In-memory only. All JSON artifacts use the kernel's
/// `canonical_json_bytes`.
#[derive(Debug, Clone)]
pub struct ArtifactBundleV1 {
    /// Artifacts indexed by logical name, in sorted order (`BTreeMap`).
    pub artifacts: BTreeMap<String, BundleArtifact>,
    /// Full manifest: canonical JSON listing all artifacts with normative flags.
    pub manifest: Vec<u8>,
    /// Digest basis: canonical JSON listing normative artifact hashes only.
    pub digest_basis: Vec<u8>,
    /// Bundle digest: `canonical_hash(DOMAIN_BUNDLE_DIGEST, digest_basis)`.
    pub digest: ContentHash,
}

/// Error building a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleBuildError {
    /// Canonical JSON serialization failed.
    CanonError { detail: String },
    /// The session record could not be summarized.
    SummaryFailed { detail: String },
}

impl std::fmt::Display for BundleBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CanonError { detail } => write!(f, "canonical JSON error: {detail}"),
            Self::SummaryFailed { detail } => write!(f, "session summary failed: {detail}"),
        }
    }
}

impl std::error::Error for BundleBuildError {}

/// Input for bundle assembly.
///
/// Callers provide artifact bytes and metadata; bundle assembly computes
/// every content hash.
pub struct ArtifactInput {
    /// Logical filename.
    pub name: String,
    /// Raw bytes of the artifact.
    pub content: Vec<u8>,
    /// Whether this artifact participates in the bundle digest.
    pub normative: bool,
}

impl From<(String, Vec<u8>, bool)> for ArtifactInput {
    fn from((name, content, normative): (String, Vec<u8>, bool)) -> Self {
        Self {
            name,
            content,
            normative,
        }
    }
}

/// Build an `ArtifactBundleV1` from a list of artifact inputs.
///
/// Computes content hashes, builds the sorted manifest and digest basis, and
/// derives the bundle digest.
///
/// Accepts `Vec<ArtifactInput>` or `Vec<(String, Vec<u8>, bool)>` (via `From`).
///
/// # Errors
///
/// Returns [`BundleBuildError::CanonError`] if canonical JSON serialization
/// fails.
pub fn build_bundle(
    artifacts: Vec<impl Into<ArtifactInput>>,
) -> Result<ArtifactBundleV1, BundleBuildError> {
    let mut artifact_map = BTreeMap::new();

    for input in artifacts {
        let input = input.into();
        let content_hash = canonical_hash(DOMAIN_BUNDLE_ARTIFACT, &input.content);
        artifact_map.insert(
            input.name.clone(),
            BundleArtifact {
                name: input.name,
                content: input.content,
                content_hash,
                normative: input.normative,
            },
        );
    }

    let manifest = compute_manifest_bytes(&artifact_map)
        .map_err(|detail| BundleBuildError::CanonError { detail })?;

    let digest_basis = compute_digest_basis_bytes(&artifact_map)
        .map_err(|detail| BundleBuildError::CanonError { detail })?;

    let digest = canonical_hash(DOMAIN_BUNDLE_DIGEST, &digest_basis);

    Ok(ArtifactBundleV1 {
        artifacts: artifact_map,
        manifest,
        digest_basis,
        digest,
    })
}

/// Package a finished session.
///
/// Normative: policy snapshot, stimulus set, trial tape, session summary,
/// normative comparison, category scores. Observational: envelope.
///
/// # Errors
///
/// Returns [`BundleBuildError`] if the summary cannot be built or any
/// artifact fails canonicalization.
pub fn build_session_bundle(
    record: &SessionRecordV1,
) -> Result<ArtifactBundleV1, BundleBuildError> {
    let canon = |value: &serde_json::Value| -> Result<Vec<u8>, BundleBuildError> {
        canonical_json_bytes(value).map_err(|e| BundleBuildError::CanonError {
            detail: e.to_string(),
        })
    };
    let summary =
        SessionSummaryV1::from_record(record).map_err(|e| BundleBuildError::SummaryFailed {
            detail: e.to_string(),
        })?;
    let policy = record
        .config
        .policy
        .snapshot_bytes()
        .map_err(|e| BundleBuildError::CanonError {
            detail: e.to_string(),
        })?;
    let envelope = serde_json::json!({
        "end": record.end.as_str(),
        "harness_version": env!("CARGO_PKG_VERSION"),
        "listener_id": record.listener_id,
        "schema_version": "session_envelope.v1",
    });

    let bundle = build_bundle(vec![
        (ARTIFACT_POLICY_SNAPSHOT.to_string(), policy, true),
        (
            ARTIFACT_STIMULUS_SET.to_string(),
            canon(&record.config.stimulus_set.to_json())?,
            true,
        ),
        (ARTIFACT_TRIAL_TAPE.to_string(), record.tape.bytes.clone(), true),
        (
            ARTIFACT_SESSION_SUMMARY.to_string(),
            canon(&summary.to_json())?,
            true,
        ),
        (
            ARTIFACT_NORMATIVE_COMPARISON.to_string(),
            canon(&comparison_json(
                &record.config.normative,
                record.normative.as_ref(),
            ))?,
            true,
        ),
        (
            ARTIFACT_CATEGORY_SCORES.to_string(),
            canon(&record.scores.to_json())?,
            true,
        ),
        (ARTIFACT_ENVELOPE.to_string(), canon(&envelope)?, false),
    ])?;
    tracing::info!(
        session_id = %record.config.session_id,
        digest = %bundle.digest,
        artifacts = bundle.artifacts.len(),
        "session bundle built"
    );
    Ok(bundle)
}

/// Error from bundle integrity verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleVerifyError {
    /// An artifact's stored `content_hash` does not match recomputed hash.
    ContentHashMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },
    /// Stored `manifest` bytes do not match recomputed manifest from artifacts.
    ManifestMismatch,
    /// Stored `manifest` bytes are not in canonical JSON form.
    ManifestNotCanonical,
    /// Stored `digest_basis` bytes do not match recomputed normative projection.
    DigestBasisMismatch,
    /// Stored `digest_basis` bytes are not in canonical JSON form.
    DigestBasisNotCanonical,
    /// Stored `digest` does not match recomputed hash of `digest_basis`.
    DigestMismatch { expected: String, actual: String },
    /// A normative JSON artifact is not in canonical JSON form.
    ArtifactNotCanonical { artifact: String },
    /// Canonical JSON error during verification.
    CanonError { detail: String },
    /// Cert profile requires `trial_tape.ndjson` but it is absent.
    TapeMissing,
    /// `trial_tape.ndjson` failed to parse (chain, structure, or JSON).
    TapeParseFailed { detail: String },
    /// A session artifact required alongside the tape is absent.
    ArtifactMissing { artifact: &'static str },
    /// `session_summary.json` failed to decode.
    SummaryParseFailed { detail: String },
    /// Tape header or footer disagrees with an authoritative artifact.
    TapeBindingMismatch {
        field: &'static str,
        in_tape: String,
        in_artifact: String,
    },
    /// Summary `policy_digest` disagrees with `policy_snapshot.json`.
    PolicyDigestMismatch {
        declared: String,
        recomputed: String,
    },
    /// Summary `tape_chain_head` disagrees with the parsed tape.
    ChainHeadMismatch { declared: String, in_tape: String },
    /// Replay could not run (policy or stimulus set rejected).
    ReplayFailed { detail: String },
    /// Replay of the tape diverged (Cert profile only).
    ReplayDivergence {
        trial_index: Option<u64>,
        detail: String,
    },
}

impl std::fmt::Display for BundleVerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContentHashMismatch {
                artifact,
                expected,
                actual,
            } => write!(f, "{artifact}: stored hash {expected}, content hashes to {actual}"),
            Self::ManifestMismatch => f.write_str("manifest does not match artifacts"),
            Self::ManifestNotCanonical => f.write_str("manifest is not canonical JSON"),
            Self::DigestBasisMismatch => f.write_str("digest basis does not match artifacts"),
            Self::DigestBasisNotCanonical => f.write_str("digest basis is not canonical JSON"),
            Self::DigestMismatch { expected, actual } => {
                write!(f, "bundle digest {expected}, recomputed {actual}")
            }
            Self::ArtifactNotCanonical { artifact } => {
                write!(f, "{artifact} is not canonical JSON")
            }
            Self::CanonError { detail } => write!(f, "canonical JSON error: {detail}"),
            Self::TapeMissing => write!(f, "{ARTIFACT_TRIAL_TAPE} required by cert profile"),
            Self::TapeParseFailed { detail } => write!(f, "trial tape does not parse: {detail}"),
            Self::ArtifactMissing { artifact } => write!(f, "{artifact} missing"),
            Self::SummaryParseFailed { detail } => {
                write!(f, "session summary does not parse: {detail}")
            }
            Self::TapeBindingMismatch {
                field,
                in_tape,
                in_artifact,
            } => write!(f, "{field}: tape has {in_tape}, artifact has {in_artifact}"),
            Self::PolicyDigestMismatch {
                declared,
                recomputed,
            } => write!(f, "policy digest {declared}, snapshot hashes to {recomputed}"),
            Self::ChainHeadMismatch { declared, in_tape } => {
                write!(f, "summary chain head {declared}, tape chain head {in_tape}")
            }
            Self::ReplayFailed { detail } => write!(f, "replay failed: {detail}"),
            Self::ReplayDivergence {
                trial_index: Some(i),
                detail,
            } => write!(f, "replay diverged at trial {i}: {detail}"),
            Self::ReplayDivergence {
                trial_index: None,
                detail,
            } => write!(f, "replay diverged at footer: {detail}"),
        }
    }
}

impl std::error::Error for BundleVerifyError {}

/// Verification profile controlling tape evidence requirements.
///
/// `Base` (default): everyday verification; if the tape is present, verify
/// parse + chain + bindings. Skips replay.
///
/// `Cert`: requires the tape and additionally replays it through a fresh
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationProfile {
    #[default]
    Base,
    Cert,
}

/// Verify a bundle using the default `Base` profile.
///
/// # Errors
///
/// Returns the first [`BundleVerifyError`] encountered.
pub fn verify_bundle(bundle: &ArtifactBundleV1) -> Result<(), BundleVerifyError> {
    verify_bundle_with_profile(bundle, VerificationProfile::Base)
}

/// Verify the internal consistency of a bundle with an explicit profile.
///
/// 1. Each artifact's `content_hash` matches `canonical_hash(DOMAIN_BUNDLE_ARTIFACT, content)`.
/// 2. `manifest` bytes match the projection recomputed from all artifacts.
/// 3. `digest_basis` bytes match the projection recomputed from normative artifacts.
/// 4. `digest` matches `canonical_hash(DOMAIN_BUNDLE_DIGEST, digest_basis)`.
/// 5. `manifest` and `digest_basis` are canonical JSON.
/// 6. Normative `.json` artifacts are canonical JSON.
/// 7. Tape (if present, or required by Cert): parses with an intact chain;
///    its header matches `policy_snapshot.json` and `stimulus_set.json`;
///    the summary's policy digest, chain head, identity and outcome match.
/// 8. Cert only: `replay_verify(tape)` returns `Match`.
///
/// # Errors
///
/// Returns the first [`BundleVerifyError`] encountered.
pub fn verify_bundle_with_profile(
    bundle: &ArtifactBundleV1,
    profile: VerificationProfile,
) -> Result<(), BundleVerifyError> {
    // Step 1: Verify each artifact's content_hash.
    for artifact in bundle.artifacts.values() {
        let recomputed = canonical_hash(DOMAIN_BUNDLE_ARTIFACT, &artifact.content);
        if recomputed != artifact.content_hash {
            return Err(BundleVerifyError::ContentHashMismatch {
                artifact: artifact.name.clone(),
                expected: artifact.content_hash.as_str().to_string(),
                actual: recomputed.as_str().to_string(),
            });
        }
    }

    // Step 2: Recompute manifest from artifacts and compare byte-for-byte.
    let expected_manifest = compute_manifest_bytes(&bundle.artifacts)
        .map_err(|detail| BundleVerifyError::CanonError { detail })?;
    if expected_manifest != bundle.manifest {
        return Err(BundleVerifyError::ManifestMismatch);
    }
    if !is_canonical(&bundle.manifest) {
        return Err(BundleVerifyError::ManifestNotCanonical);
    }

    // Step 3: Recompute digest_basis from normative artifacts and compare.
    let expected_basis = compute_digest_basis_bytes(&bundle.artifacts)
        .map_err(|detail| BundleVerifyError::CanonError { detail })?;
    if expected_basis != bundle.digest_basis {
        return Err(BundleVerifyError::DigestBasisMismatch);
    }
    if !is_canonical(&bundle.digest_basis) {
        return Err(BundleVerifyError::DigestBasisNotCanonical);
    }

    // Step 4: Verify bundle digest.
    let recomputed_digest = canonical_hash(DOMAIN_BUNDLE_DIGEST, &bundle.digest_basis);
    if recomputed_digest != bundle.digest {
        return Err(BundleVerifyError::DigestMismatch {
            expected: bundle.digest.as_str().to_string(),
            actual: recomputed_digest.as_str().to_string(),
        });
    }

    // Step 5: Verify normative JSON artifacts are canonical.
    for artifact in bundle.artifacts.values() {
        let is_json = std::path::Path::new(&artifact.name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if artifact.normative && is_json && !is_canonical(&artifact.content) {
            return Err(BundleVerifyError::ArtifactNotCanonical {
                artifact: artifact.name.clone(),
            });
        }
    }

    // Step 6: Tape and its bindings (profile-dependent).
    let Some(tape) = verify_tape(bundle, profile)? else {
        return Ok(());
    };

    // Step 7: Replay (Cert only).
    if profile == VerificationProfile::Cert {
        match replay_verify(&tape) {
            Ok(ReplayVerdictV1::Match) => {}
            Ok(ReplayVerdictV1::Divergence {
                trial_index,
                detail,
            }) => {
                return Err(BundleVerifyError::ReplayDivergence {
                    trial_index,
                    detail,
                })
            }
            Err(e) => {
                return Err(BundleVerifyError::ReplayFailed {
                    detail: e.to_string(),
                })
            }
        }
    }

    Ok(())
}

/// Recompute manifest bytes from the artifact map.
fn compute_manifest_bytes(artifacts: &BTreeMap<String, BundleArtifact>) -> Result<Vec<u8>, String> {
    let manifest_artifacts: Vec<serde_json::Value> = artifacts
        .values()
        .map(|a| {
            serde_json::json!({
                "content_hash": a.content_hash.as_str(),
                "name": a.name,
                "normative": a.normative,
            })
        })
        .collect();

    let manifest_value = serde_json::json!({
        "artifacts": manifest_artifacts,
        "schema_version": "bundle.v1",
    });

    canonical_json_bytes(&manifest_value).map_err(|e| e.to_string())
}

/// Recompute digest basis bytes from normative artifacts only.
fn compute_digest_basis_bytes(
    artifacts: &BTreeMap<String, BundleArtifact>,
) -> Result<Vec<u8>, String> {
    let normative_artifacts: Vec<serde_json::Value> = artifacts
        .values()
        .filter(|a| a.normative)
        .map(|a| {
            serde_json::json!({
                "content_hash": a.content_hash.as_str(),
                "name": a.name,
            })
        })
        .collect();

    let digest_basis_value = serde_json::json!({
        "artifacts": normative_artifacts,
        "schema_version": "bundle_digest_basis.v1",
    });

    canonical_json_bytes(&digest_basis_value).map_err(|e| e.to_string())
}

fn is_canonical(bytes: &[u8]) -> bool {
    uli_kernel::proof::canon::is_canonical_json(bytes)
}

/// Parse the tape and check it against the policy, stimulus set and summary
/// artifacts. Returns `None` when the tape is absent under `Base`.
fn verify_tape(
    bundle: &ArtifactBundleV1,
    profile: VerificationProfile,
) -> Result<Option<TrialTapeV1>, BundleVerifyError> {
    let tape_artifact = match (bundle.artifacts.get(ARTIFACT_TRIAL_TAPE), profile) {
        (None, VerificationProfile::Cert) => return Err(BundleVerifyError::TapeMissing),
        (None, VerificationProfile::Base) => return Ok(None),
        (Some(artifact), _) => artifact,
    };
    let required = |artifact: &'static str| {
        bundle
            .artifacts
            .get(artifact)
            .ok_or(BundleVerifyError::ArtifactMissing { artifact })
    };

    // Chain integrity is checked by the reader.
    let tape = read_tape(&tape_artifact.content).map_err(|e| BundleVerifyError::TapeParseFailed {
        detail: e.to_string(),
    })?;

    // Header ↔ policy_snapshot.json.
    let policy_artifact = required(ARTIFACT_POLICY_SNAPSHOT)?;
    let tape_policy = tape
        .header
        .policy
        .snapshot_bytes()
        .map_err(|e| BundleVerifyError::CanonError {
            detail: e.to_string(),
        })?;
    if tape_policy != policy_artifact.content {
        return Err(BundleVerifyError::TapeBindingMismatch {
            field: "policy",
            in_tape: String::from_utf8_lossy(&tape_policy).into_owned(),
            in_artifact: String::from_utf8_lossy(&policy_artifact.content).into_owned(),
        });
    }

    // Header ↔ stimulus_set.json.
    let stimulus_artifact = required(ARTIFACT_STIMULUS_SET)?;
    let tape_stimuli = canonical_json_bytes(&tape.header.stimulus_set.to_json()).map_err(|e| {
        BundleVerifyError::CanonError {
            detail: e.to_string(),
        }
    })?;
    if tape_stimuli != stimulus_artifact.content {
        return Err(BundleVerifyError::TapeBindingMismatch {
            field: "stimulus_set",
            in_tape: String::from_utf8_lossy(&tape_stimuli).into_owned(),
            in_artifact: String::from_utf8_lossy(&stimulus_artifact.content).into_owned(),
        });
    }

    // Summary ↔ policy snapshot, tape chain head, header, footer.
    let summary_artifact = required(ARTIFACT_SESSION_SUMMARY)?;
    let summary_json: serde_json::Value = serde_json::from_slice(&summary_artifact.content)
        .map_err(|e| BundleVerifyError::SummaryParseFailed {
            detail: e.to_string(),
        })?;
    let summary = SessionSummaryV1::from_json(&summary_json).map_err(|e| {
        BundleVerifyError::SummaryParseFailed {
            detail: e.to_string(),
        }
    })?;

    let policy_digest = canonical_hash(DOMAIN_POLICY_SNAPSHOT, &policy_artifact.content);
    if summary.policy_digest != policy_digest {
        return Err(BundleVerifyError::PolicyDigestMismatch {
            declared: summary.policy_digest.as_str().to_string(),
            recomputed: policy_digest.as_str().to_string(),
        });
    }
    if summary.tape_chain_head != tape.chain_head {
        return Err(BundleVerifyError::ChainHeadMismatch {
            declared: summary.tape_chain_head.as_str().to_string(),
            in_tape: tape.chain_head.as_str().to_string(),
        });
    }
    let bindings: [(&'static str, String, String); 4] = [
        (
            "session_id",
            tape.header.session_id.clone(),
            summary.session_id.clone(),
        ),
        (
            "client_id",
            tape.header.client_id.clone(),
            summary.client_id.clone(),
        ),
        (
            "status",
            tape.footer.status.as_str().to_string(),
            summary.status.as_str().to_string(),
        ),
        (
            "trial_count",
            tape.footer.trial_count.to_string(),
            summary.trial_count.to_string(),
        ),
    ];
    for (field, in_tape, in_artifact) in bindings {
        if in_tape != in_artifact {
            return Err(BundleVerifyError::TapeBindingMismatch {
                field,
                in_tape,
                in_artifact,
            });
        }
    }

    Ok(Some(tape))
}
