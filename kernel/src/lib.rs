//! ULI Kernel: the deterministic data carrier for the adaptive staircase.
//!
//! # API Surface
//!
//! - [`carrier::level::SnrLevel`] -- fixed-point SNR level (integer millidecibels)
//! - [`carrier::stimulus`] -- VCV stimulus tokens, phonetic categories, stimulus sets
//! - [`proof::canon::canonical_json_bytes`] -- the single serialization-for-hashing path
//! - [`proof::hash::canonical_hash`] -- domain-separated SHA-256 content hashing
//!
//! # Module Dependency Direction
//!
//! `carrier` and `proof` are independent leaves. Higher crates render carrier
//! values to canonical JSON and hash them through `proof`; nothing in the
//! kernel depends on the staircase or the harness.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod carrier;
pub mod proof;
