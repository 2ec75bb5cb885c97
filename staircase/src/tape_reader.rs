//! Tape reader: fail-closed NDJSON parsing with chain verification.
//!
//! Parses tape bytes into [`TrialTapeV1`], enforcing every structural
//! invariant: canonical lines, header first, dense trial indices, exactly
//! one footer, matching trial count, and an unbroken hash chain. Any
//! violation produces a typed [`TapeParseError`].

use uli_kernel::proof::canon::{canonical_json_bytes, is_canonical_json};
use uli_kernel::proof::hash::{canonical_hash, chained_hash, ContentHash};

use crate::tape::{
    trial_from_json, TapeFooterV1, TapeHeaderV1, TapeParseError, TrialTapeV1, CHAIN_FIELD,
    DOMAIN_TRIAL_TAPE, DOMAIN_TRIAL_TAPE_CHAIN, KIND_FOOTER, KIND_HEADER, KIND_TRIAL,
};
use crate::trial::TrialV1;

/// Parse exactly one tape.
///
/// # Errors
///
/// Returns [`TapeParseError`] on any structural or integrity violation,
/// including records after the footer.
pub fn read_tape(bytes: &[u8]) -> Result<TrialTapeV1, TapeParseError> {
    let mut lines = Lines::new(bytes);
    let tape = read_one(&mut lines)?;
    if let Some((line, kind)) = lines.peek_kind()? {
        return Err(TapeParseError::UnexpectedRecord { line, kind });
    }
    Ok(tape)
}

/// Parse a stream of concatenated tapes, as produced by appending one tape
/// per session to a flat log.
///
/// # Errors
///
/// Returns [`TapeParseError`] on the first violation in any tape. An empty
/// input yields an empty list.
pub fn read_tapes(bytes: &[u8]) -> Result<Vec<TrialTapeV1>, TapeParseError> {
    let mut lines = Lines::new(bytes);
    let mut tapes = Vec::new();
    while lines.peek_kind()?.is_some() {
        tapes.push(read_one(&mut lines)?);
    }
    Ok(tapes)
}

fn read_one(lines: &mut Lines<'_>) -> Result<TrialTapeV1, TapeParseError> {
    // --- Header ---
    let Some(first) = lines.next_record()? else {
        return Err(TapeParseError::Empty);
    };
    if first.kind != KIND_HEADER {
        return Err(TapeParseError::MissingHeader { line: first.line });
    }
    let mut chain = canonical_hash(DOMAIN_TRIAL_TAPE, &first.body_bytes);
    first.check_chain(&chain)?;
    let header = TapeHeaderV1::from_json(first.line, &first.value)?;

    // --- Trials, then footer ---
    let mut trials: Vec<TrialV1> = Vec::new();
    loop {
        let Some(record) = lines.next_record()? else {
            return Err(TapeParseError::MissingFooter);
        };
        chain = chained_hash(DOMAIN_TRIAL_TAPE_CHAIN, &chain, &record.body_bytes);
        record.check_chain(&chain)?;

        match record.kind.as_str() {
            KIND_TRIAL => {
                let trial = trial_from_json(record.line, &record.value)?;
                let expected = trials.len() as u64;
                if trial.index != expected {
                    return Err(TapeParseError::IndexGap {
                        line: record.line,
                        expected,
                        got: trial.index,
                    });
                }
                trials.push(trial);
            }
            KIND_FOOTER => {
                let footer = TapeFooterV1::from_json(record.line, &record.value)?;
                let decoded = trials.len() as u64;
                if footer.trial_count != decoded {
                    return Err(TapeParseError::TrialCountMismatch {
                        footer: footer.trial_count,
                        decoded,
                    });
                }
                return Ok(TrialTapeV1 {
                    header,
                    trials,
                    footer,
                    chain_head: chain,
                });
            }
            KIND_HEADER => {
                return Err(TapeParseError::UnexpectedRecord {
                    line: record.line,
                    kind: record.kind.clone(),
                })
            }
            _ => {
                return Err(TapeParseError::UnknownKind {
                    line: record.line,
                    kind: record.kind.clone(),
                })
            }
        }
    }
}

/// One decoded line.
struct Record {
    line: u64,
    kind: String,
    /// Parsed record, `chain` still present.
    value: serde_json::Value,
    /// Canonical bytes of the record with `chain` removed.
    body_bytes: Vec<u8>,
    chain: String,
}

impl Record {
    fn check_chain(&self, expected: &ContentHash) -> Result<(), TapeParseError> {
        if self.chain == expected.as_str() {
            Ok(())
        } else {
            Err(TapeParseError::ChainMismatch { line: self.line })
        }
    }
}

/// Line cursor over NDJSON bytes. Blank lines are skipped.
struct Lines<'a> {
    rest: &'a [u8],
    line: u64,
}

impl<'a> Lines<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            rest: bytes,
            line: 0,
        }
    }

    fn next_raw(&mut self) -> Option<(u64, &'a [u8])> {
        loop {
            if self.rest.is_empty() {
                return None;
            }
            let (raw, rest) = match self.rest.iter().position(|b| *b == b'\n') {
                Some(end) => (&self.rest[..end], &self.rest[end + 1..]),
                None => (self.rest, &self.rest[self.rest.len()..]),
            };
            self.rest = rest;
            let line = self.line;
            self.line += 1;
            if !raw.iter().all(u8::is_ascii_whitespace) {
                return Some((line, raw));
            }
        }
    }

    fn next_record(&mut self) -> Result<Option<Record>, TapeParseError> {
        let Some((line, raw)) = self.next_raw() else {
            return Ok(None);
        };
        if !is_canonical_json(raw) {
            return Err(match serde_json::from_slice::<serde_json::Value>(raw) {
                Err(e) => TapeParseError::InvalidJson {
                    line,
                    detail: e.to_string(),
                },
                Ok(_) => TapeParseError::NonCanonicalLine { line },
            });
        }
        let value: serde_json::Value =
            serde_json::from_slice(raw).map_err(|e| TapeParseError::InvalidJson {
                line,
                detail: e.to_string(),
            })?;
        let Some(object) = value.as_object() else {
            return Err(TapeParseError::MissingField {
                line,
                field: "kind".into(),
            });
        };
        let kind = object
            .get("kind")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| TapeParseError::MissingField {
                line,
                field: "kind".into(),
            })?
            .to_string();
        let chain = object
            .get(CHAIN_FIELD)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| TapeParseError::MissingField {
                line,
                field: CHAIN_FIELD.into(),
            })?
            .to_string();
        let mut body = object.clone();
        body.remove(CHAIN_FIELD);
        let body_bytes = canonical_json_bytes(&serde_json::Value::Object(body)).map_err(|e| {
            TapeParseError::InvalidJson {
                line,
                detail: e.to_string(),
            }
        })?;
        Ok(Some(Record {
            line,
            kind,
            value,
            body_bytes,
            chain,
        }))
    }

    /// Kind of the next non-blank record without consuming it.
    fn peek_kind(&self) -> Result<Option<(u64, String)>, TapeParseError> {
        let mut probe = Lines {
            rest: self.rest,
            line: self.line,
        };
        Ok(probe.next_record()?.map(|r| (r.line, r.kind)))
    }
}
