//! Stimulus tokens and the closed vocabulary a session draws from.
//!
//! Tokens are vowel-consonant-vowel (VCV) nonsense words such as `aka`,
//! `obo`, `ili`. A token whose outer vowels agree and fall in {a, o, i}, and
//! whose consonant has a known place of articulation, is classified into a
//! [`PhoneticCategory`]. Other tokens are valid stimuli but unclassified.
//!
//! Consonant manner bands follow the dominant burst/frication energy:
//!
//! | band | consonants |
//! |------|------------|
//! | Low  | p b m      |
//! | Mid  | k g n      |
//! | High | t d l s    |

use std::collections::BTreeSet;

/// Keypad tokens shown to the listener, in keypad order.
pub const KEYPAD_TOKENS: [&str; 6] = ["aka", "obo", "ili", "apa", "oto", "uku"];

/// Maximum token length in bytes.
pub const MAX_TOKEN_LEN: usize = 16;

/// Typed failure for stimulus construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StimulusError {
    /// Token is empty.
    EmptyToken,
    /// Token contains characters outside `[a-z]` or exceeds [`MAX_TOKEN_LEN`].
    InvalidToken { token: String },
}

impl std::fmt::Display for StimulusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyToken => write!(f, "stimulus token is empty"),
            Self::InvalidToken { token } => write!(
                f,
                "stimulus token {token:?} must be 1..={MAX_TOKEN_LEN} lowercase ASCII letters"
            ),
        }
    }
}

impl std::error::Error for StimulusError {}

/// A single stimulus token.
///
/// Invariant: non-empty, lowercase ASCII letters only, at most
/// [`MAX_TOKEN_LEN`] bytes (enforced by [`StimulusId::new`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StimulusId(String);

impl StimulusId {
    /// Validate and wrap a token.
    ///
    /// # Errors
    ///
    /// Returns [`StimulusError`] if the token is empty, too long, or contains
    /// anything other than `a..=z`.
    pub fn new(token: &str) -> Result<Self, StimulusError> {
        if token.is_empty() {
            return Err(StimulusError::EmptyToken);
        }
        if token.len() > MAX_TOKEN_LEN || !token.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(StimulusError::InvalidToken {
                token: token.to_string(),
            });
        }
        Ok(Self(token.to_string()))
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Phonetic category, if this is a classifiable VCV token.
    #[must_use]
    pub fn category(&self) -> Option<PhoneticCategory> {
        classify_vcv(&self.0)
    }
}

impl std::fmt::Display for StimulusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vowel context of a VCV token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VowelContext {
    A,
    O,
    I,
}

impl VowelContext {
    /// All contexts in report order.
    pub const ALL: [Self; 3] = [Self::A, Self::O, Self::I];

    /// Lowercase label (`"a"`, `"o"`, `"i"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::O => "o",
            Self::I => "i",
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'a' => Some(Self::A),
            b'o' => Some(Self::O),
            b'i' => Some(Self::I),
            _ => None,
        }
    }
}

/// Consonant manner band of a VCV token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConsonantManner {
    Low,
    Mid,
    High,
}

impl ConsonantManner {
    /// All bands in report order.
    pub const ALL: [Self; 3] = [Self::Low, Self::Mid, Self::High];

    /// Lowercase label (`"low"`, `"mid"`, `"high"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'p' | b'b' | b'm' => Some(Self::Low),
            b'k' | b'g' | b'n' => Some(Self::Mid),
            b't' | b'd' | b'l' | b's' => Some(Self::High),
            _ => None,
        }
    }
}

/// Vowel context × consonant manner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhoneticCategory {
    pub vowel: VowelContext,
    pub manner: ConsonantManner,
}

/// Classify a VCV token. Returns `None` for anything that is not exactly
/// `vowel consonant same-vowel` with a known vowel and consonant.
#[must_use]
pub fn classify_vcv(token: &str) -> Option<PhoneticCategory> {
    let &[v1, c, v2] = token.as_bytes() else {
        return None;
    };
    if v1 != v2 {
        return None;
    }
    Some(PhoneticCategory {
        vowel: VowelContext::from_byte(v1)?,
        manner: ConsonantManner::from_byte(c)?,
    })
}

/// The closed set of stimuli a session may present.
///
/// Members are kept in a `BTreeSet` so iteration order is lexicographic and
/// independent of construction order. Duplicates collapse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StimulusSetV1 {
    members: BTreeSet<StimulusId>,
}

impl StimulusSetV1 {
    /// Build a set from already-validated ids.
    #[must_use]
    pub fn new(members: impl IntoIterator<Item = StimulusId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    /// Build a set from raw tokens.
    ///
    /// # Errors
    ///
    /// Returns the first [`StimulusError`] encountered.
    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self, StimulusError> {
        let members = tokens
            .into_iter()
            .map(StimulusId::new)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { members })
    }

    /// The listener keypad vocabulary ([`KEYPAD_TOKENS`]).
    #[must_use]
    pub fn keypad() -> Self {
        Self {
            members: KEYPAD_TOKENS
                .iter()
                .map(|t| StimulusId((*t).to_string()))
                .collect(),
        }
    }

    /// Number of distinct members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Membership test.
    #[must_use]
    pub fn contains(&self, id: &StimulusId) -> bool {
        self.members.contains(id)
    }

    /// Members in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &StimulusId> {
        self.members.iter()
    }

    /// JSON array of tokens in lexicographic order.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.members
                .iter()
                .map(|m| serde_json::Value::String(m.as_str().to_string()))
                .collect(),
        )
    }

    /// Parse the array produced by [`StimulusSetV1::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`StimulusError::InvalidToken`] if the value is not an array of
    /// strings or any token is invalid.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, StimulusError> {
        let Some(items) = value.as_array() else {
            return Err(StimulusError::InvalidToken {
                token: value.to_string(),
            });
        };
        let mut members = BTreeSet::new();
        for item in items {
            let token = item.as_str().ok_or_else(|| StimulusError::InvalidToken {
                token: item.to_string(),
            })?;
            members.insert(StimulusId::new(token)?);
        }
        Ok(Self { members })
    }
}
