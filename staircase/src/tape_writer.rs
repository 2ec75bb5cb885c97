//! `TapeWriter`: streaming NDJSON tape output.
//!
//! Writes one canonical record per line to an in-memory buffer, maintaining
//! the running hash chain. `finish()` writes the footer and consumes the
//! writer, so a tape has exactly one footer and it is always last.

use uli_kernel::carrier::level::SnrLevel;
use uli_kernel::proof::canon::canonical_json_bytes;
use uli_kernel::proof::hash::{canonical_hash, chained_hash, ContentHash};

use crate::controller::StaircaseController;
use crate::selector::StimulusSelector;
use crate::tape::{
    TapeFooterV1, TapeHeaderV1, TapeOutput, TapeWriteError, CHAIN_FIELD, DOMAIN_TRIAL_TAPE,
    DOMAIN_TRIAL_TAPE_CHAIN, KIND_TRIAL,
};
use crate::trial::TrialV1;

/// Streaming tape writer.
pub struct TapeWriter {
    /// Accumulated NDJSON bytes.
    buf: Vec<u8>,
    /// Running chain value.
    chain: ContentHash,
    /// Records written so far (header included).
    record_count: u64,
}

impl TapeWriter {
    /// Create a writer and emit the header record.
    ///
    /// The chain is seeded as `h0 = canonical_hash(DOMAIN_TRIAL_TAPE, header_bytes)`.
    ///
    /// # Errors
    ///
    /// Returns [`TapeWriteError::CanonError`] if the header cannot be
    /// canonicalized.
    pub fn new(header: &TapeHeaderV1) -> Result<Self, TapeWriteError> {
        let body = header.to_json();
        let bytes = canon(&body)?;
        let chain = canonical_hash(DOMAIN_TRIAL_TAPE, &bytes);
        let mut writer = Self {
            buf: Vec::with_capacity(4096),
            chain,
            record_count: 0,
        };
        writer.emit(body)?;
        Ok(writer)
    }

    /// Append one trial record.
    ///
    /// # Errors
    ///
    /// Returns [`TapeWriteError::CanonError`] on canonicalization failure;
    /// the buffer is untouched in that case.
    pub fn on_trial(&mut self, trial: &TrialV1) -> Result<(), TapeWriteError> {
        let mut body = trial.to_json();
        body["kind"] = serde_json::Value::String(KIND_TRIAL.into());
        self.advance(body)
    }

    /// Append the footer and return the finished tape.
    ///
    /// # Errors
    ///
    /// Returns [`TapeWriteError::CanonError`] on canonicalization failure.
    pub fn finish(mut self, footer: &TapeFooterV1) -> Result<TapeOutput, TapeWriteError> {
        self.advance(footer.to_json())?;
        Ok(TapeOutput {
            bytes: self.buf,
            chain_head: self.chain,
            record_count: self.record_count,
        })
    }

    /// `h_i = chained_hash(DOMAIN_TRIAL_TAPE_CHAIN, h_{i-1}, record_bytes)`, then emit.
    fn advance(&mut self, body: serde_json::Value) -> Result<(), TapeWriteError> {
        let bytes = canon(&body)?;
        let next = chained_hash(DOMAIN_TRIAL_TAPE_CHAIN, &self.chain, &bytes);
        let previous = std::mem::replace(&mut self.chain, next);
        if let Err(e) = self.emit(body) {
            self.chain = previous;
            return Err(e);
        }
        Ok(())
    }

    fn emit(&mut self, mut body: serde_json::Value) -> Result<(), TapeWriteError> {
        body[CHAIN_FIELD] = serde_json::Value::String(self.chain.as_str().to_string());
        let line = canon(&body)?;
        self.buf.extend_from_slice(&line);
        self.buf.push(b'\n');
        self.record_count += 1;
        Ok(())
    }
}

fn canon(value: &serde_json::Value) -> Result<Vec<u8>, TapeWriteError> {
    canonical_json_bytes(value).map_err(|e| TapeWriteError::CanonError(e.to_string()))
}

/// Footer describing the controller's current outcome.
#[must_use]
pub fn footer_for<S: StimulusSelector>(controller: &StaircaseController<S>) -> TapeFooterV1 {
    let state = controller.state();
    TapeFooterV1 {
        status: state.status(),
        trial_count: state.trial_history().len() as u64,
        reversal_levels: state.reversal_levels().to_vec(),
        estimate: controller
            .partial_estimate()
            .ok()
            .and_then(SnrLevel::from_db),
    }
}

/// Render a whole session as a tape.
///
/// # Errors
///
/// Returns [`TapeWriteError::CanonError`] on canonicalization failure.
pub fn write_session<S: StimulusSelector>(
    session_id: &str,
    client_id: &str,
    controller: &StaircaseController<S>,
) -> Result<TapeOutput, TapeWriteError> {
    let header = TapeHeaderV1 {
        session_id: session_id.to_string(),
        client_id: client_id.to_string(),
        policy: *controller.policy(),
        stimulus_set: controller.stimulus_set().clone(),
        selector_id: controller.selector_id(),
    };
    let mut writer = TapeWriter::new(&header)?;
    for trial in controller.state().trial_history() {
        writer.on_trial(trial)?;
    }
    let output = writer.finish(&footer_for(controller))?;
    tracing::info!(
        session_id,
        records = output.record_count,
        chain_head = %output.chain_head,
        "trial tape written"
    );
    Ok(output)
}
