//! ULI Harness: session-level orchestration for the staircase.
//!
//! The harness drives a listener through a staircase session
//! (`start` → [`next_stimulus` → `respond` → `submit_response`] × N
//! → `write_session` → `replay_verify`) and packages the result as a
//! self-contained artifact bundle, a session summary and append-only logs.
//!
//! The harness does NOT implement staircase logic; it delegates to
//! `uli-staircase`. Listeners provide responses only; the harness owns
//! orchestration, scoring and the normative comparison.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bundle;
pub mod config;
pub mod contract;
pub mod listeners;
pub mod log;
pub mod normative;
pub mod results;
pub mod runner;
pub mod scoring;
pub mod summary;
