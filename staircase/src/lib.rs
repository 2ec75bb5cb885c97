//! ULI Staircase: the adaptive N-down/1-up threshold search engine.
//!
//! This crate depends only on `uli_kernel`; it does NOT depend on
//! `uli_harness`.
//!
//! # Crate dependency graph
//!
//! ```text
//! uli_kernel  ←  uli_staircase  ←  uli_harness
//! (levels,        (controller,       (listeners, runner,
//!  stimuli,        tape, replay)      bundles, logs)
//!  hashing)
//! ```
//!
//! # Key types
//!
//! - [`StaircaseController`] -- owns one session's state and drives it
//! - [`StaircasePolicyV1`] -- immutable step and convergence configuration
//! - [`ControllerStateV1`] -- level, run length, reversals, history, status
//! - [`TrialV1`] -- one immutable trial record
//! - [`StimulusSelector`] -- trait for anti-repeat target selection
//! - [`TrialTapeV1`] -- hash-chained NDJSON audit log of a session
//! - [`replay_verify`] -- re-drive a fresh controller from a tape

#![forbid(unsafe_code)]

pub mod controller;
pub mod error;
pub mod estimate;
pub mod policy;
pub mod replay;
pub mod selector;
pub mod state;
pub mod tape;
pub mod tape_reader;
pub mod tape_writer;
pub mod trial;

pub use controller::StaircaseController;
pub use error::StaircaseError;
pub use policy::{PolicyConfig, StaircasePolicyV1};
pub use replay::{replay_verify, ReplayVerdictV1};
pub use selector::{CyclicSelector, SeededSelector, StimulusSelector};
pub use state::{ControllerStateV1, SessionStatusV1};
pub use tape::{TapeOutput, TrialTapeV1};
pub use trial::{Direction, ResponseV1, TrialV1};
