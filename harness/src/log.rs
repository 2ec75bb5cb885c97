//! Append-only session logs on disk.
//!
//! # Layout
//!
//! ```text
//! <dir>/
//!   <client_id>.ndjson   -- one canonical session summary per line
//! ```
//!
//! Tapes go to a caller-chosen flat file; each finished session appends its
//! complete header → trials → footer run, and [`read_tape_file`] splits the
//! file back into sessions, verifying every chain.
//!
//! Files are only ever opened for append. Nothing here rewrites or deletes.
//!
//! # Fail-closed semantics
//!
//! - Client ids outside `[A-Za-z0-9_-]{1,64}` → error (they name files)
//! - Any unparseable summary line → error naming the line
//! - Any tape chain or structure fault → error

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use uli_kernel::proof::canon::canonical_json_bytes;
use uli_staircase::tape::TapeParseError;
use uli_staircase::tape_reader::read_tapes;
use uli_staircase::{TapeOutput, TrialTapeV1};

use crate::config::validate_id;
use crate::summary::SessionSummaryV1;

/// Error reading or appending a log.
#[derive(Debug)]
pub enum LogError {
    /// I/O error.
    Io { path: PathBuf, detail: String },
    /// Client id cannot name a log file.
    InvalidClientId { detail: String },
    /// Canonical JSON serialization failed.
    CanonError { detail: String },
    /// A summary line failed to decode.
    SummaryLine { line: usize, detail: String },
    /// The tape file failed to parse.
    Tape(TapeParseError),
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, detail } => write!(f, "I/O error on {}: {detail}", path.display()),
            Self::InvalidClientId { detail } => write!(f, "invalid client id: {detail}"),
            Self::CanonError { detail } => write!(f, "canonical JSON error: {detail}"),
            Self::SummaryLine { line, detail } => write!(f, "summary line {line}: {detail}"),
            Self::Tape(e) => write!(f, "tape file: {e}"),
        }
    }
}

impl std::error::Error for LogError {}

fn io_error(path: &Path, e: &std::io::Error) -> LogError {
    LogError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Per-client summary logs under one directory.
#[derive(Debug, Clone)]
pub struct ClientLog {
    dir: PathBuf,
}

impl ClientLog {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Log file of `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidClientId`] for an id that cannot name a file.
    pub fn path_for(&self, client_id: &str) -> Result<PathBuf, LogError> {
        validate_id("client_id", client_id).map_err(|e| LogError::InvalidClientId {
            detail: e.to_string(),
        })?;
        Ok(self.dir.join(format!("{client_id}.ndjson")))
    }

    /// Append one summary line to its client's log, creating the directory
    /// and file on first use. Returns the log path.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] on an invalid client id, canonicalization
    /// failure, or I/O failure.
    pub fn append_summary(&self, summary: &SessionSummaryV1) -> Result<PathBuf, LogError> {
        let path = self.path_for(&summary.client_id)?;
        let mut line =
            canonical_json_bytes(&summary.to_json()).map_err(|e| LogError::CanonError {
                detail: e.to_string(),
            })?;
        line.push(b'\n');
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, &e))?;
        append_bytes(&path, &line)?;
        tracing::info!(
            client_id = %summary.client_id,
            session_id = %summary.session_id,
            path = %path.display(),
            "session summary appended"
        );
        Ok(path)
    }

    /// Every summary logged for `client_id`, oldest first. A client with no
    /// log file has no summaries.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] on an invalid client id, I/O failure, or any
    /// line that does not decode.
    pub fn read_summaries(&self, client_id: &str) -> Result<Vec<SessionSummaryV1>, LogError> {
        let path = self.path_for(client_id)?;
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&path, &e)),
        };
        text.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| {
                let value: serde_json::Value =
                    serde_json::from_str(l).map_err(|e| LogError::SummaryLine {
                        line: i,
                        detail: e.to_string(),
                    })?;
                SessionSummaryV1::from_json(&value).map_err(|e| LogError::SummaryLine {
                    line: i,
                    detail: e.to_string(),
                })
            })
            .collect()
    }
}

/// Append a finished session's tape to a flat NDJSON file.
///
/// # Errors
///
/// Returns [`LogError::Io`] on I/O failure.
pub fn append_tape(path: &Path, tape: &TapeOutput) -> Result<(), LogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
    }
    append_bytes(path, &tape.bytes)?;
    tracing::debug!(
        path = %path.display(),
        records = tape.record_count,
        chain_head = %tape.chain_head,
        "tape appended"
    );
    Ok(())
}

/// Every session in a tape file, in append order.
///
/// # Errors
///
/// Returns [`LogError::Io`] on I/O failure and [`LogError::Tape`] if any
/// session fails to parse or its chain does not verify.
pub fn read_tape_file(path: &Path) -> Result<Vec<TrialTapeV1>, LogError> {
    let bytes = std::fs::read(path).map_err(|e| io_error(path, &e))?;
    read_tapes(&bytes).map_err(LogError::Tape)
}

fn append_bytes(path: &Path, bytes: &[u8]) -> Result<(), LogError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, &e))?;
    file.write_all(bytes).map_err(|e| io_error(path, &e))?;
    file.flush().map_err(|e| io_error(path, &e))
}
