//! `TrialTapeV1`: hash-chained NDJSON session log types and errors.
//!
//! A tape is the complete, replayable record of one session. It is written
//! after the session ends and is what the host appends to its flat log.
//!
//! # Wire format
//!
//! ```text
//! {"chain":"sha256:..","client_id":..,"kind":"header",..}\n
//! {"chain":"sha256:..","correct":true,"index":0,"kind":"trial",..}\n
//! ...
//! {"chain":"sha256:..","kind":"footer","status":"converged",..}\n
//! ```
//!
//! Every line is canonical JSON. A record's `chain` covers the canonical
//! bytes of the same record with `chain` removed:
//!
//! - header: `h0 = sha256(DOMAIN_TRIAL_TAPE || header_bytes)`
//! - others: `h_i = sha256(DOMAIN_TRIAL_TAPE_CHAIN || h_{i-1} || record_bytes)`
//!
//! The footer's `chain` is the tape's chain head.

use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::carrier::stimulus::{StimulusId, StimulusSetV1};
use uli_kernel::proof::hash::{ContentHash, HashDomain};

use crate::policy::StaircasePolicyV1;
use crate::state::SessionStatusV1;
use crate::trial::{Direction, ResponseV1, TrialV1};

/// Tape schema tag carried in the header.
pub const TRIAL_TAPE_SCHEMA_VERSION: &str = "trial_tape.v1";

/// Domain prefix for the header hash (chain seed).
pub const DOMAIN_TRIAL_TAPE: HashDomain = HashDomain::TrialTape;

/// Domain prefix for every subsequent chain step.
pub const DOMAIN_TRIAL_TAPE_CHAIN: HashDomain = HashDomain::TrialTapeChain;

/// Record kind tags.
pub const KIND_HEADER: &str = "header";
pub const KIND_TRIAL: &str = "trial";
pub const KIND_FOOTER: &str = "footer";

/// Field holding the chain value on every record.
pub const CHAIN_FIELD: &str = "chain";

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Session identity and configuration, committed before any trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeHeaderV1 {
    /// Host-assigned session identifier.
    pub session_id: String,
    /// Client (patient) identifier.
    pub client_id: String,
    pub policy: StaircasePolicyV1,
    pub stimulus_set: StimulusSetV1,
    /// [`crate::StimulusSelector::selector_id`] of the live selector.
    pub selector_id: String,
}

/// Session outcome, written once after the last trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeFooterV1 {
    pub status: SessionStatusV1,
    pub trial_count: u64,
    pub reversal_levels: Vec<SnrLevel>,
    /// Midpoint estimate rounded to the nearest millidecibel, when one exists.
    pub estimate: Option<SnrLevel>,
}

/// A parsed, chain-verified tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialTapeV1 {
    pub header: TapeHeaderV1,
    pub trials: Vec<TrialV1>,
    pub footer: TapeFooterV1,
    /// Chain value of the footer record.
    pub chain_head: ContentHash,
}

/// Output of [`crate::tape_writer::TapeWriter::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeOutput {
    /// NDJSON bytes, one canonical record per line, newline-terminated.
    pub bytes: Vec<u8>,
    /// Chain value of the footer record.
    pub chain_head: ContentHash,
    /// Header + trials + footer.
    pub record_count: u64,
}

impl TapeHeaderV1 {
    /// Record body without `chain`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "client_id": self.client_id,
            "kind": KIND_HEADER,
            "policy": self.policy.snapshot_json(),
            "schema_version": TRIAL_TAPE_SCHEMA_VERSION,
            "selector_id": self.selector_id,
            "session_id": self.session_id,
            "stimulus_set": self.stimulus_set.to_json(),
        })
    }

    pub(crate) fn from_json(line: u64, v: &serde_json::Value) -> Result<Self, TapeParseError> {
        let schema = str_field(line, v, "schema_version")?;
        if schema != TRIAL_TAPE_SCHEMA_VERSION {
            return Err(TapeParseError::UnsupportedVersion {
                got: schema.to_string(),
            });
        }
        let policy = StaircasePolicyV1::from_snapshot_json(&v["policy"]).map_err(|e| {
            TapeParseError::InvalidField {
                line,
                field: "policy".into(),
                detail: e.to_string(),
            }
        })?;
        let stimulus_set = StimulusSetV1::from_json(&v["stimulus_set"]).map_err(|e| {
            TapeParseError::InvalidField {
                line,
                field: "stimulus_set".into(),
                detail: e.to_string(),
            }
        })?;
        Ok(Self {
            session_id: str_field(line, v, "session_id")?.to_string(),
            client_id: str_field(line, v, "client_id")?.to_string(),
            policy,
            stimulus_set,
            selector_id: str_field(line, v, "selector_id")?.to_string(),
        })
    }
}

impl TapeFooterV1 {
    /// Record body without `chain`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "estimate_mdb": self.estimate.map(SnrLevel::millidb),
            "kind": KIND_FOOTER,
            "reversal_levels_mdb": self
                .reversal_levels
                .iter()
                .map(|l| l.millidb())
                .collect::<Vec<_>>(),
            "status": self.status.as_str(),
            "trial_count": self.trial_count,
        })
    }

    pub(crate) fn from_json(line: u64, v: &serde_json::Value) -> Result<Self, TapeParseError> {
        let status_tag = str_field(line, v, "status")?;
        let status =
            SessionStatusV1::parse(status_tag).ok_or_else(|| TapeParseError::InvalidField {
                line,
                field: "status".into(),
                detail: format!("unknown status {status_tag:?}"),
            })?;
        let reversal_levels = v["reversal_levels_mdb"]
            .as_array()
            .ok_or_else(|| missing(line, "reversal_levels_mdb"))?
            .iter()
            .map(|x| x.as_i64().map(SnrLevel::from_millidb))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TapeParseError::InvalidField {
                line,
                field: "reversal_levels_mdb".into(),
                detail: "entries must be integers".into(),
            })?;
        let estimate = match &v["estimate_mdb"] {
            serde_json::Value::Null => None,
            other => Some(SnrLevel::from_millidb(
                other.as_i64().ok_or_else(|| missing(line, "estimate_mdb"))?,
            )),
        };
        Ok(Self {
            status,
            trial_count: u64_field(line, v, "trial_count")?,
            reversal_levels,
            estimate,
        })
    }
}

pub(crate) fn trial_from_json(line: u64, v: &serde_json::Value) -> Result<TrialV1, TapeParseError> {
    let stimulus = |field: &str| -> Result<StimulusId, TapeParseError> {
        StimulusId::new(str_field(line, v, field)?).map_err(|e| TapeParseError::InvalidField {
            line,
            field: field.into(),
            detail: e.to_string(),
        })
    };
    let response = match &v["response"] {
        serde_json::Value::Null => ResponseV1::Timeout,
        serde_json::Value::String(_) => ResponseV1::Selected(stimulus("response")?),
        _ => return Err(missing(line, "response")),
    };
    let direction_tag = str_field(line, v, "direction")?;
    let direction = Direction::parse(direction_tag).ok_or_else(|| TapeParseError::InvalidField {
        line,
        field: "direction".into(),
        detail: format!("unknown direction {direction_tag:?}"),
    })?;
    Ok(TrialV1 {
        index: u64_field(line, v, "index")?,
        presented_stimulus: stimulus("presented")?,
        presented_level: SnrLevel::from_millidb(i64_field(line, v, "presented_level_mdb")?),
        response,
        correct: bool_field(line, v, "correct")?,
        direction,
        level_after: SnrLevel::from_millidb(i64_field(line, v, "level_after_mdb")?),
        reversal: bool_field(line, v, "reversal")?,
        timestamp_ms: u64_field(line, v, "timestamp_ms")?,
    })
}

fn missing(line: u64, field: &str) -> TapeParseError {
    TapeParseError::MissingField {
        line,
        field: field.into(),
    }
}

fn str_field<'a>(line: u64, v: &'a serde_json::Value, field: &str) -> Result<&'a str, TapeParseError> {
    v[field].as_str().ok_or_else(|| missing(line, field))
}

fn u64_field(line: u64, v: &serde_json::Value, field: &str) -> Result<u64, TapeParseError> {
    v[field].as_u64().ok_or_else(|| missing(line, field))
}

fn i64_field(line: u64, v: &serde_json::Value, field: &str) -> Result<i64, TapeParseError> {
    v[field].as_i64().ok_or_else(|| missing(line, field))
}

fn bool_field(line: u64, v: &serde_json::Value, field: &str) -> Result<bool, TapeParseError> {
    v[field].as_bool().ok_or_else(|| missing(line, field))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors during tape writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapeWriteError {
    /// Canonical JSON serialization failed.
    CanonError(String),
}

impl std::fmt::Display for TapeWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CanonError(detail) => write!(f, "canonical JSON error: {detail}"),
        }
    }
}

impl std::error::Error for TapeWriteError {}

/// Errors during tape parsing (fail-closed).
///
/// `line` is the zero-based line number within the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapeParseError {
    /// Input contains no records.
    Empty,
    /// A line is not valid JSON.
    InvalidJson { line: u64, detail: String },
    /// A line is valid JSON but not in canonical form.
    NonCanonicalLine { line: u64 },
    /// Required field absent or of the wrong type.
    MissingField { line: u64, field: String },
    /// Field present but its value is not acceptable.
    InvalidField {
        line: u64,
        field: String,
        detail: String,
    },
    /// Unknown `kind` tag.
    UnknownKind { line: u64, kind: String },
    /// Unsupported `schema_version` in the header.
    UnsupportedVersion { got: String },
    /// First record of a tape is not a header.
    MissingHeader { line: u64 },
    /// Input ended before the footer.
    MissingFooter,
    /// Header or trial record after the footer, or a second header
    /// mid-tape.
    UnexpectedRecord { line: u64, kind: String },
    /// Recorded chain value does not match the recomputed one.
    ChainMismatch { line: u64 },
    /// Trial index is not the next expected index.
    IndexGap { line: u64, expected: u64, got: u64 },
    /// Footer `trial_count` does not match the decoded trial count.
    TrialCountMismatch { footer: u64, decoded: u64 },
}

impl std::fmt::Display for TapeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "tape contains no records"),
            Self::InvalidJson { line, detail } => write!(f, "line {line}: invalid JSON: {detail}"),
            Self::NonCanonicalLine { line } => write!(f, "line {line}: not canonical JSON"),
            Self::MissingField { line, field } => {
                write!(f, "line {line}: missing or mistyped field {field:?}")
            }
            Self::InvalidField {
                line,
                field,
                detail,
            } => write!(f, "line {line}: invalid {field}: {detail}"),
            Self::UnknownKind { line, kind } => write!(f, "line {line}: unknown kind {kind:?}"),
            Self::UnsupportedVersion { got } => write!(f, "unsupported tape schema {got:?}"),
            Self::MissingHeader { line } => write!(f, "line {line}: tape does not start with a header"),
            Self::MissingFooter => write!(f, "tape ended without a footer"),
            Self::UnexpectedRecord { line, kind } => {
                write!(f, "line {line}: unexpected {kind} record")
            }
            Self::ChainMismatch { line } => write!(f, "line {line}: chain hash mismatch"),
            Self::IndexGap {
                line,
                expected,
                got,
            } => write!(f, "line {line}: expected trial index {expected}, got {got}"),
            Self::TrialCountMismatch { footer, decoded } => write!(
                f,
                "footer trial_count {footer} does not match {decoded} decoded trials"
            ),
        }
    }
}

impl std::error::Error for TapeParseError {}
