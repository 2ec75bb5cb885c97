//! Staircase policy: step sizes, convergence rule, clamp bounds.
//!
//! [`StaircasePolicyV1`] is immutable for the life of a session. Hosts build
//! one from [`PolicyConfig`] overrides (typically parsed from JSON) applied
//! over [`StaircasePolicyV1::default`], then call
//! [`StaircasePolicyV1::validate`]. The canonical snapshot committed into
//! every tape and bundle comes from [`StaircasePolicyV1::snapshot_json`].

use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::proof::canon::canonical_json_bytes;
use uli_kernel::proof::hash::{canonical_hash, ContentHash, HashDomain};

use crate::error::StaircaseError;

/// Snapshot schema tag.
pub const POLICY_SCHEMA_VERSION: &str = "staircase_policy.v1";

/// Domain prefix for policy snapshot hashing.
pub const DOMAIN_POLICY_SNAPSHOT: HashDomain = HashDomain::PolicySnapshot;

/// N-down/1-up staircase configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaircasePolicyV1 {
    /// Starting level.
    pub initial_level: SnrLevel,
    /// Level increase after an incorrect response.
    pub step_up: SnrLevel,
    /// Level decrease after `n_correct_for_down` consecutive correct responses.
    pub step_down: SnrLevel,
    /// Run length of correct responses that triggers a `Down` move.
    pub n_correct_for_down: u32,
    /// Reversals required to declare convergence; also the estimator window.
    pub min_reversals_for_convergence: u32,
    /// Hard cap on trials.
    pub max_trials: u32,
    /// Lowest reachable level.
    pub level_floor: SnrLevel,
    /// Highest reachable level.
    pub level_ceiling: SnrLevel,
}

impl Default for StaircasePolicyV1 {
    /// 2-down/1-up from -8 dB, +2/-1 dB steps, 6 reversals, 50 trials,
    /// clamped to [-20, 5] dB.
    fn default() -> Self {
        Self {
            initial_level: SnrLevel::from_millidb(-8_000),
            step_up: SnrLevel::from_millidb(2_000),
            step_down: SnrLevel::from_millidb(1_000),
            n_correct_for_down: 2,
            min_reversals_for_convergence: 6,
            max_trials: 50,
            level_floor: SnrLevel::from_millidb(-20_000),
            level_ceiling: SnrLevel::from_millidb(5_000),
        }
    }
}

impl StaircasePolicyV1 {
    /// Check every construction-time precondition.
    ///
    /// # Errors
    ///
    /// Returns [`StaircaseError::InvalidPolicy`] naming the first violated
    /// precondition.
    pub fn validate(&self) -> Result<(), StaircaseError> {
        let fail = |detail: String| Err(StaircaseError::InvalidPolicy { detail });

        if self.level_floor >= self.level_ceiling {
            return fail(format!(
                "level_floor ({}) must be below level_ceiling ({})",
                self.level_floor, self.level_ceiling
            ));
        }
        if !self.initial_level.within(self.level_floor, self.level_ceiling) {
            return fail(format!(
                "initial_level ({}) outside [{}, {}]",
                self.initial_level, self.level_floor, self.level_ceiling
            ));
        }
        if !self.step_up.is_positive() {
            return fail(format!("step_up ({}) must be positive", self.step_up));
        }
        if !self.step_down.is_positive() {
            return fail(format!("step_down ({}) must be positive", self.step_down));
        }
        if self.n_correct_for_down == 0 {
            return fail("n_correct_for_down must be at least 1".into());
        }
        if self.min_reversals_for_convergence == 0 {
            return fail("min_reversals_for_convergence must be at least 1".into());
        }
        if self.max_trials == 0 {
            return fail("max_trials must be at least 1".into());
        }
        Ok(())
    }

    /// Snapshot JSON (integers only).
    #[must_use]
    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::json!({
            "initial_level_mdb": self.initial_level.millidb(),
            "level_ceiling_mdb": self.level_ceiling.millidb(),
            "level_floor_mdb": self.level_floor.millidb(),
            "max_trials": self.max_trials,
            "min_reversals_for_convergence": self.min_reversals_for_convergence,
            "n_correct_for_down": self.n_correct_for_down,
            "schema_version": POLICY_SCHEMA_VERSION,
            "step_down_mdb": self.step_down.millidb(),
            "step_up_mdb": self.step_up.millidb(),
        })
    }

    /// Canonical snapshot bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StaircaseError::InvalidPolicy`] if canonicalization fails,
    /// which cannot happen for integer-only snapshots.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>, StaircaseError> {
        canonical_json_bytes(&self.snapshot_json()).map_err(|e| StaircaseError::InvalidPolicy {
            detail: format!("canonical JSON error: {e}"),
        })
    }

    /// `canonical_hash(DOMAIN_POLICY_SNAPSHOT, snapshot_bytes)`.
    ///
    /// # Errors
    ///
    /// Propagates [`StaircasePolicyV1::snapshot_bytes`] failures.
    pub fn digest(&self) -> Result<ContentHash, StaircaseError> {
        Ok(canonical_hash(DOMAIN_POLICY_SNAPSHOT, &self.snapshot_bytes()?))
    }

    /// Parse a snapshot produced by [`StaircasePolicyV1::snapshot_json`].
    ///
    /// The result is not validated; callers validate before use.
    ///
    /// # Errors
    ///
    /// Returns [`StaircaseError::InvalidPolicy`] on a wrong schema version or a
    /// missing or mistyped field.
    pub fn from_snapshot_json(value: &serde_json::Value) -> Result<Self, StaircaseError> {
        let schema = value["schema_version"].as_str().unwrap_or("");
        if schema != POLICY_SCHEMA_VERSION {
            return Err(StaircaseError::InvalidPolicy {
                detail: format!("unsupported policy schema_version {schema:?}"),
            });
        }
        let level = |key: &str| -> Result<SnrLevel, StaircaseError> {
            value[key]
                .as_i64()
                .map(SnrLevel::from_millidb)
                .ok_or_else(|| StaircaseError::InvalidPolicy {
                    detail: format!("snapshot field {key} missing or not an integer"),
                })
        };
        let count = |key: &str| -> Result<u32, StaircaseError> {
            value[key]
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| StaircaseError::InvalidPolicy {
                    detail: format!("snapshot field {key} missing or not a u32"),
                })
        };
        Ok(Self {
            initial_level: level("initial_level_mdb")?,
            step_up: level("step_up_mdb")?,
            step_down: level("step_down_mdb")?,
            n_correct_for_down: count("n_correct_for_down")?,
            min_reversals_for_convergence: count("min_reversals_for_convergence")?,
            max_trials: count("max_trials")?,
            level_floor: level("level_floor_mdb")?,
            level_ceiling: level("level_ceiling_mdb")?,
        })
    }
}

/// Policy overrides in host units (decibels).
///
/// `None` keeps the default. This is the shape hosts read from their
/// configuration files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyConfig {
    pub initial_level_db: Option<f64>,
    pub step_up_db: Option<f64>,
    pub step_down_db: Option<f64>,
    pub n_correct_for_down: Option<u32>,
    pub min_reversals_for_convergence: Option<u32>,
    pub max_trials: Option<u32>,
    pub level_floor_db: Option<f64>,
    pub level_ceiling_db: Option<f64>,
}

/// Keys accepted by [`PolicyConfig::from_json`].
const CONFIG_KEYS: [&str; 8] = [
    "initial_level_db",
    "step_up_db",
    "step_down_db",
    "n_correct_for_down",
    "min_reversals_for_convergence",
    "max_trials",
    "level_floor_db",
    "level_ceiling_db",
];

impl PolicyConfig {
    /// Parse a JSON object of overrides. Unknown keys are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`StaircaseError::InvalidPolicy`] for non-objects, unknown
    /// keys, or values of the wrong type.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, StaircaseError> {
        let Some(map) = value.as_object() else {
            return Err(StaircaseError::InvalidPolicy {
                detail: "policy config must be a JSON object".into(),
            });
        };
        if let Some(unknown) = map.keys().find(|k| !CONFIG_KEYS.contains(&k.as_str())) {
            return Err(StaircaseError::InvalidPolicy {
                detail: format!("unknown policy key {unknown:?}"),
            });
        }
        let db = |key: &str| -> Result<Option<f64>, StaircaseError> {
            match map.get(key) {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(v) => v.as_f64().map(Some).ok_or_else(|| StaircaseError::InvalidPolicy {
                    detail: format!("{key} must be a number"),
                }),
            }
        };
        let count = |key: &str| -> Result<Option<u32>, StaircaseError> {
            match map.get(key) {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(v) => v
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .map(Some)
                    .ok_or_else(|| StaircaseError::InvalidPolicy {
                        detail: format!("{key} must be a non-negative integer"),
                    }),
            }
        };
        Ok(Self {
            initial_level_db: db("initial_level_db")?,
            step_up_db: db("step_up_db")?,
            step_down_db: db("step_down_db")?,
            n_correct_for_down: count("n_correct_for_down")?,
            min_reversals_for_convergence: count("min_reversals_for_convergence")?,
            max_trials: count("max_trials")?,
            level_floor_db: db("level_floor_db")?,
            level_ceiling_db: db("level_ceiling_db")?,
        })
    }

    /// Apply overrides over [`StaircasePolicyV1::default`] and validate.
    ///
    /// # Errors
    ///
    /// Returns [`StaircaseError::InvalidPolicy`] if a decibel value is not
    /// representable or the resulting policy fails validation.
    pub fn resolve(&self) -> Result<StaircasePolicyV1, StaircaseError> {
        let base = StaircasePolicyV1::default();
        let level = |name: &str, v: Option<f64>, fallback: SnrLevel| match v {
            None => Ok(fallback),
            Some(db) => SnrLevel::from_db(db).ok_or_else(|| StaircaseError::InvalidPolicy {
                detail: format!("{name} ({db}) is not a representable level"),
            }),
        };
        let policy = StaircasePolicyV1 {
            initial_level: level("initial_level_db", self.initial_level_db, base.initial_level)?,
            step_up: level("step_up_db", self.step_up_db, base.step_up)?,
            step_down: level("step_down_db", self.step_down_db, base.step_down)?,
            n_correct_for_down: self.n_correct_for_down.unwrap_or(base.n_correct_for_down),
            min_reversals_for_convergence: self
                .min_reversals_for_convergence
                .unwrap_or(base.min_reversals_for_convergence),
            max_trials: self.max_trials.unwrap_or(base.max_trials),
            level_floor: level("level_floor_db", self.level_floor_db, base.level_floor)?,
            level_ceiling: level("level_ceiling_db", self.level_ceiling_db, base.level_ceiling)?,
        };
        policy.validate()?;
        Ok(policy)
    }
}
