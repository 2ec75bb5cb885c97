//! Canonical JSON bytes: the single serialization-for-hashing path.
//!
//! All hashed artifacts (policy snapshots, tape records, bundle manifests)
//! are rendered here.
//!
//! # Canonicalization rules
//!
//! 1. Object keys sorted lexicographically by byte order.
//! 2. Compact form, no whitespace.
//! 3. Strings escaped by `serde_json`'s string serializer.
//! 4. Numbers must be integers (`i64` or `u64`). Levels travel as integer
//!    millidecibels; a float anywhere is rejected.
//! 5. Output is valid UTF-8.

use std::io::Write;

/// Error type for canonical JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonError {
    /// A JSON number was not an integer.
    NonIntegerNumber { path: String, raw: String },
}

impl std::fmt::Display for CanonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonIntegerNumber { path, raw } => {
                write!(f, "non-integer number at {path}: {raw}")
            }
        }
    }
}

impl std::error::Error for CanonError {}

/// Produce canonical JSON bytes from a `serde_json::Value`.
///
/// # Errors
///
/// Returns [`CanonError::NonIntegerNumber`] naming the JSON path of the first
/// non-integer number.
pub fn canonical_json_bytes(value: &serde_json::Value) -> Result<Vec<u8>, CanonError> {
    let mut out = CanonicalWriter {
        buf: Vec::with_capacity(128),
        path: vec![String::from("$")],
    };
    out.value(value)?;
    Ok(out.buf)
}

/// Whether `bytes` are already in canonical form.
///
/// Parses the bytes and re-renders them; invalid JSON is not canonical.
#[must_use]
pub fn is_canonical_json(bytes: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()
        .and_then(|v| canonical_json_bytes(&v).ok())
        .is_some_and(|rendered| rendered == bytes)
}

struct CanonicalWriter {
    buf: Vec<u8>,
    path: Vec<String>,
}

impl CanonicalWriter {
    fn value(&mut self, value: &serde_json::Value) -> Result<(), CanonError> {
        match value {
            serde_json::Value::Null => self.buf.extend_from_slice(b"null"),
            serde_json::Value::Bool(true) => self.buf.extend_from_slice(b"true"),
            serde_json::Value::Bool(false) => self.buf.extend_from_slice(b"false"),
            serde_json::Value::Number(n) => self.number(n)?,
            serde_json::Value::String(s) => self.string(s),
            serde_json::Value::Array(items) => {
                self.buf.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.buf.push(b',');
                    }
                    self.path.push(format!("[{i}]"));
                    self.value(item)?;
                    self.path.pop();
                }
                self.buf.push(b']');
            }
            serde_json::Value::Object(map) => {
                let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

                self.buf.push(b'{');
                for (i, (key, item)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        self.buf.push(b',');
                    }
                    self.string(key);
                    self.buf.push(b':');
                    self.path.push(format!(".{key}"));
                    self.value(item)?;
                    self.path.pop();
                }
                self.buf.push(b'}');
            }
        }
        Ok(())
    }

    fn number(&mut self, n: &serde_json::Number) -> Result<(), CanonError> {
        if let Some(i) = n.as_i64() {
            let _ = write!(self.buf, "{i}");
        } else if let Some(u) = n.as_u64() {
            let _ = write!(self.buf, "{u}");
        } else {
            return Err(CanonError::NonIntegerNumber {
                path: self.path.concat(),
                raw: n.to_string(),
            });
        }
        Ok(())
    }

    fn string(&mut self, s: &str) {
        // Serializing a &str into a Vec cannot fail.
        let _ = serde_json::to_writer(&mut self.buf, s);
    }
}
