//! Session configuration.
//!
//! A [`SessionConfigV1`] is everything the runner needs besides the
//! listener: identity, staircase policy, vocabulary, selector seed, the
//! logical trial clock, an optional early stop, and the normative
//! reference. Hosts usually parse it from a JSON document:
//!
//! ```json
//! {
//!   "session_id": "2026-10-19-a",
//!   "client_id": "client-042",
//!   "policy": { "initial_level_db": -6.0, "min_reversals_for_convergence": 8 },
//!   "stimuli": ["aka", "obo", "ili"],
//!   "selector_seed": 7,
//!   "trial_interval_ms": 2500,
//!   "abort_after_trials": null,
//!   "normative": { "mean_db": -8.0, "sd_db": 1.6 }
//! }
//! ```
//!
//! Every key is optional except `session_id` and `client_id`; unknown keys
//! are rejected.

use uli_kernel::carrier::stimulus::StimulusSetV1;
use uli_staircase::{PolicyConfig, StaircasePolicyV1};

use crate::normative::NormativeReferenceV1;

/// Default logical time between trials.
pub const DEFAULT_TRIAL_INTERVAL_MS: u64 = 2_500;

/// Maximum identifier length.
pub const MAX_ID_LEN: usize = 64;

const CONFIG_KEYS: [&str; 8] = [
    "session_id",
    "client_id",
    "policy",
    "stimuli",
    "selector_seed",
    "trial_interval_ms",
    "abort_after_trials",
    "normative",
];

/// Error loading a session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Document is not valid JSON.
    Parse { detail: String },
    /// Key not recognized.
    UnknownKey { key: String },
    /// Required key absent or mistyped.
    MissingField { field: String },
    /// Value present but invalid.
    InvalidField { field: String, detail: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { detail } => write!(f, "session config is not valid JSON: {detail}"),
            Self::UnknownKey { key } => write!(f, "unknown session config key {key:?}"),
            Self::MissingField { field } => write!(f, "missing or mistyped field {field:?}"),
            Self::InvalidField { field, detail } => write!(f, "invalid {field}: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// One session's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfigV1 {
    pub session_id: String,
    /// Client identifier; also names the client's append-only log file.
    pub client_id: String,
    pub policy: StaircasePolicyV1,
    pub stimulus_set: StimulusSetV1,
    pub selector_seed: u64,
    /// Trial `i` is stamped `i * trial_interval_ms`.
    pub trial_interval_ms: u64,
    /// Abort after this many trials (the operator's Stop button).
    pub abort_after_trials: Option<u32>,
    pub normative: NormativeReferenceV1,
}

impl SessionConfigV1 {
    /// Default policy, keypad vocabulary, seed 0, no early stop.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] if either identifier is not a
    /// valid id (see [`validate_id`]).
    pub fn new(session_id: &str, client_id: &str) -> Result<Self, ConfigError> {
        validate_id("session_id", session_id)?;
        validate_id("client_id", client_id)?;
        Ok(Self {
            session_id: session_id.to_string(),
            client_id: client_id.to_string(),
            policy: StaircasePolicyV1::default(),
            stimulus_set: StimulusSetV1::keypad(),
            selector_seed: 0,
            trial_interval_ms: DEFAULT_TRIAL_INTERVAL_MS,
            abort_after_trials: None,
            normative: NormativeReferenceV1::default(),
        })
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on invalid JSON, unknown keys, missing
    /// identifiers, or any value that fails validation (including the
    /// resolved staircase policy).
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse {
                detail: e.to_string(),
            })?;
        Self::from_json(&value)
    }

    /// Parse an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// See [`SessionConfigV1::from_json_str`].
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let Some(map) = value.as_object() else {
            return Err(ConfigError::Parse {
                detail: "session config must be a JSON object".into(),
            });
        };
        if let Some(key) = map.keys().find(|k| !CONFIG_KEYS.contains(&k.as_str())) {
            return Err(ConfigError::UnknownKey { key: key.clone() });
        }
        let id = |field: &str| -> Result<&str, ConfigError> {
            map.get(field)
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| ConfigError::MissingField {
                    field: field.into(),
                })
        };
        let mut config = Self::new(id("session_id")?, id("client_id")?)?;

        if let Some(policy) = present(map.get("policy")) {
            config.policy = PolicyConfig::from_json(policy)
                .and_then(|p| p.resolve())
                .map_err(|e| invalid("policy", e))?;
        }
        if let Some(stimuli) = present(map.get("stimuli")) {
            config.stimulus_set =
                StimulusSetV1::from_json(stimuli).map_err(|e| invalid("stimuli", e))?;
        }
        if let Some(seed) = present(map.get("selector_seed")) {
            config.selector_seed = seed.as_u64().ok_or_else(|| missing("selector_seed"))?;
        }
        if let Some(interval) = present(map.get("trial_interval_ms")) {
            config.trial_interval_ms =
                interval.as_u64().ok_or_else(|| missing("trial_interval_ms"))?;
        }
        if let Some(abort) = present(map.get("abort_after_trials")) {
            let n = abort
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| missing("abort_after_trials"))?;
            config.abort_after_trials = Some(n);
        }
        if let Some(normative) = present(map.get("normative")) {
            let number = |field: &str, fallback: f64| -> Result<f64, ConfigError> {
                match present(normative.get(field)) {
                    None => Ok(fallback),
                    Some(v) => v.as_f64().ok_or_else(|| missing(&format!("normative.{field}"))),
                }
            };
            config.normative = NormativeReferenceV1 {
                mean_db: number("mean_db", config.normative.mean_db)?,
                sd_db: number("sd_db", config.normative.sd_db)?,
            };
            config
                .normative
                .validate()
                .map_err(|e| invalid("normative", e))?;
        }
        Ok(config)
    }
}

/// Identifiers are 1..=64 characters of `[A-Za-z0-9_-]`, so a client id can
/// name a log file directly.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] naming `field`.
pub fn validate_id(field: &str, id: &str) -> Result<(), ConfigError> {
    let ok = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidField {
            field: field.into(),
            detail: format!("{id:?} must be 1..={MAX_ID_LEN} characters of [A-Za-z0-9_-]"),
        })
    }
}

fn present(v: Option<&serde_json::Value>) -> Option<&serde_json::Value> {
    v.filter(|v| !v.is_null())
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingField {
        field: field.into(),
    }
}

fn invalid(field: &str, e: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidField {
        field: field.into(),
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uli_kernel::carrier::level::SnrLevel;

    #[test]
    fn minimal_document_uses_defaults() {
        let c = SessionConfigV1::from_json_str(r#"{"session_id":"s1","client_id":"c1"}"#).unwrap();
        assert_eq!(c.policy, StaircasePolicyV1::default());
        assert_eq!(c.stimulus_set, StimulusSetV1::keypad());
        assert_eq!(c.trial_interval_ms, DEFAULT_TRIAL_INTERVAL_MS);
        assert_eq!(c.abort_after_trials, None);
        assert_eq!(c.normative, NormativeReferenceV1::default());
    }

    #[test]
    fn full_document_applies_every_field() {
        let c = SessionConfigV1::from_json_str(
            r#"{
                "session_id": "2026-10-19-a",
                "client_id": "client-042",
                "policy": {"initial_level_db": -6.0, "min_reversals_for_convergence": 8},
                "stimuli": ["aka", "obo", "ili"],
                "selector_seed": 7,
                "trial_interval_ms": 1000,
                "abort_after_trials": 12,
                "normative": {"mean_db": -7.5}
            }"#,
        )
        .unwrap();
        assert_eq!(c.policy.initial_level, SnrLevel::from_millidb(-6_000));
        assert_eq!(c.policy.min_reversals_for_convergence, 8);
        assert_eq!(c.stimulus_set.len(), 3);
        assert_eq!(c.selector_seed, 7);
        assert_eq!(c.trial_interval_ms, 1000);
        assert_eq!(c.abort_after_trials, Some(12));
        assert!((c.normative.mean_db - -7.5).abs() < 1e-12);
        assert!((c.normative.sd_db - 1.6).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_documents() {
        for (doc, why) in [
            ("not json", "parse"),
            (r#"{"client_id":"c"}"#, "missing session_id"),
            (r#"{"session_id":"s","client_id":"../etc"}"#, "path-like client id"),
            (r#"{"session_id":"s","client_id":"c","extra":1}"#, "unknown key"),
            (r#"{"session_id":"s","client_id":"c","policy":{"max_trials":0}}"#, "bad policy"),
            (r#"{"session_id":"s","client_id":"c","stimuli":["AKA"]}"#, "bad token"),
            (r#"{"session_id":"s","client_id":"c","normative":{"sd_db":-1}}"#, "bad sd"),
            (r#"{"session_id":"s","client_id":"c","selector_seed":-1}"#, "negative seed"),
        ] {
            assert!(SessionConfigV1::from_json_str(doc).is_err(), "{why}");
        }
    }

    #[test]
    fn id_validation() {
        assert!(validate_id("client_id", "client_042-b").is_ok());
        assert!(validate_id("client_id", "").is_err());
        assert!(validate_id("client_id", "a b").is_err());
        assert!(validate_id("client_id", &"x".repeat(MAX_ID_LEN + 1)).is_err());
    }
}
