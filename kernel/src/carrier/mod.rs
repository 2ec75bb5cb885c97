//! Carrier module: the value types every trial record is built from.
//!
//! Depends on nothing internal.

pub mod level;
pub mod stimulus;
