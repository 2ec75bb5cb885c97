//! Proof module: canonical JSON and domain-separated hashing.
//!
//! Independent of `carrier`. Callers render carrier values to JSON and hash
//! them here.

pub mod canon;
pub mod hash;
pub mod hash_domain;
