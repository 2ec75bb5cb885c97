//! Session summary: the one-line record a host keeps per finished session.
//!
//! A summary is what the screener, monitoring and history screens read back.
//! It binds to its evidence by two hashes: the policy snapshot digest and the
//! trial tape's chain head. JSON is integer-only so the summary can be
//! hashed into a bundle and appended to a client log verbatim.

use std::collections::BTreeMap;

use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::proof::hash::ContentHash;
use uli_staircase::SessionStatusV1;

use crate::normative::ppm;
use crate::runner::{RunError, SessionRecordV1};
use crate::scoring::Tally;

/// Schema tag of summary documents.
pub const SUMMARY_SCHEMA_VERSION: &str = "session_summary.v1";

/// Error decoding a summary document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryParseError {
    MissingField { field: String },
    InvalidField { field: String, detail: String },
    UnsupportedVersion { got: String },
}

impl std::fmt::Display for SummaryParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "summary field {field:?} missing"),
            Self::InvalidField { field, detail } => {
                write!(f, "summary field {field:?} invalid: {detail}")
            }
            Self::UnsupportedVersion { got } => {
                write!(f, "unsupported summary schema_version {got:?}")
            }
        }
    }
}

impl std::error::Error for SummaryParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummaryV1 {
    pub session_id: String,
    pub client_id: String,
    pub listener_id: String,
    pub status: SessionStatusV1,
    /// [`crate::runner::SessionEndV1::as_str`] label.
    pub end: String,
    pub trial_count: u64,
    pub reversal_levels: Vec<SnrLevel>,
    pub final_estimate: Option<SnrLevel>,
    pub partial_estimate: Option<SnrLevel>,
    /// Normative CDF at the partial estimate, parts per million.
    pub percentile_ppm: Option<i64>,
    pub overall: Tally,
    /// Fitting bars keyed by category label, percent in tenths.
    pub fitting_permille: BTreeMap<String, Option<u32>>,
    pub policy_digest: ContentHash,
    pub tape_chain_head: ContentHash,
}

impl SessionSummaryV1 {
    /// Summarize a finished session.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Staircase`] if the policy digest cannot be
    /// computed.
    pub fn from_record(record: &SessionRecordV1) -> Result<Self, RunError> {
        let scores = &record.scores;
        let fitting_permille = scores
            .by_vowel
            .iter()
            .chain(scores.by_manner.iter())
            .map(|(label, tally)| ((*label).to_string(), tally.permille()))
            .collect();
        Ok(Self {
            session_id: record.config.session_id.clone(),
            client_id: record.config.client_id.clone(),
            listener_id: record.listener_id.clone(),
            status: record.status(),
            end: record.end.as_str().to_string(),
            trial_count: record.state.trial_history().len() as u64,
            reversal_levels: record.state.reversal_levels().to_vec(),
            final_estimate: record.final_estimate.and_then(SnrLevel::from_db),
            partial_estimate: record.partial_estimate.and_then(SnrLevel::from_db),
            percentile_ppm: record.normative.as_ref().map(|c| ppm(c.cdf)),
            overall: scores.overall,
            fitting_permille,
            policy_digest: record.config.policy.digest()?,
            tape_chain_head: record.tape.chain_head.clone(),
        })
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let fitting: serde_json::Map<String, serde_json::Value> = self
            .fitting_permille
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::json!(v)))
            .collect();
        serde_json::json!({
            "client_id": self.client_id,
            "end": self.end,
            "final_estimate_mdb": self.final_estimate.map(SnrLevel::millidb),
            "fitting_permille": fitting,
            "listener_id": self.listener_id,
            "overall": { "correct": self.overall.correct, "total": self.overall.total },
            "partial_estimate_mdb": self.partial_estimate.map(SnrLevel::millidb),
            "percentile_ppm": self.percentile_ppm,
            "policy_digest": self.policy_digest.as_str(),
            "reversal_levels_mdb": self.reversal_levels.iter().map(|l| l.millidb()).collect::<Vec<_>>(),
            "schema_version": SUMMARY_SCHEMA_VERSION,
            "session_id": self.session_id,
            "status": self.status.as_str(),
            "tape_chain_head": self.tape_chain_head.as_str(),
            "trial_count": self.trial_count,
        })
    }

    /// Decode a document produced by [`SessionSummaryV1::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`SummaryParseError`] on a wrong schema version or any
    /// missing or mistyped field.
    pub fn from_json(v: &serde_json::Value) -> Result<Self, SummaryParseError> {
        let schema = v["schema_version"].as_str().unwrap_or("");
        if schema != SUMMARY_SCHEMA_VERSION {
            return Err(SummaryParseError::UnsupportedVersion {
                got: schema.to_string(),
            });
        }
        let string = |field: &str| -> Result<String, SummaryParseError> {
            v[field]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| missing(field))
        };
        let hash = |field: &str| -> Result<ContentHash, SummaryParseError> {
            let raw = string(field)?;
            ContentHash::parse(&raw).ok_or_else(|| invalid(field, format!("{raw:?} is not a content hash")))
        };
        let optional_level = |field: &str| -> Result<Option<SnrLevel>, SummaryParseError> {
            match &v[field] {
                serde_json::Value::Null => Ok(None),
                other => other
                    .as_i64()
                    .map(|m| Some(SnrLevel::from_millidb(m)))
                    .ok_or_else(|| invalid(field, "not an integer")),
            }
        };
        let count = |value: &serde_json::Value, field: &str| -> Result<u32, SummaryParseError> {
            value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| invalid(field, "not a u32"))
        };

        let status_tag = string("status")?;
        let status = SessionStatusV1::parse(&status_tag)
            .ok_or_else(|| invalid("status", format!("unknown status {status_tag:?}")))?;
        let reversal_levels = v["reversal_levels_mdb"]
            .as_array()
            .ok_or_else(|| missing("reversal_levels_mdb"))?
            .iter()
            .map(|l| {
                l.as_i64()
                    .map(SnrLevel::from_millidb)
                    .ok_or_else(|| invalid("reversal_levels_mdb", "not an integer"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let percentile_ppm = match &v["percentile_ppm"] {
            serde_json::Value::Null => None,
            other => Some(
                other
                    .as_i64()
                    .ok_or_else(|| invalid("percentile_ppm", "not an integer"))?,
            ),
        };
        let overall = Tally {
            correct: count(&v["overall"]["correct"], "overall.correct")?,
            total: count(&v["overall"]["total"], "overall.total")?,
        };
        let fitting_permille = v["fitting_permille"]
            .as_object()
            .ok_or_else(|| missing("fitting_permille"))?
            .iter()
            .map(|(label, value)| {
                let permille = if value.is_null() {
                    None
                } else {
                    Some(count(value, "fitting_permille")?)
                };
                Ok((label.clone(), permille))
            })
            .collect::<Result<BTreeMap<_, _>, SummaryParseError>>()?;

        Ok(Self {
            session_id: string("session_id")?,
            client_id: string("client_id")?,
            listener_id: string("listener_id")?,
            status,
            end: string("end")?,
            trial_count: v["trial_count"]
                .as_u64()
                .ok_or_else(|| missing("trial_count"))?,
            reversal_levels,
            final_estimate: optional_level("final_estimate_mdb")?,
            partial_estimate: optional_level("partial_estimate_mdb")?,
            percentile_ppm,
            overall,
            fitting_permille,
            policy_digest: hash("policy_digest")?,
            tape_chain_head: hash("tape_chain_head")?,
        })
    }
}

fn missing(field: &str) -> SummaryParseError {
    SummaryParseError::MissingField {
        field: field.into(),
    }
}

fn invalid(field: &str, detail: impl Into<String>) -> SummaryParseError {
    SummaryParseError::InvalidField {
        field: field.into(),
        detail: detail.into(),
    }
}
