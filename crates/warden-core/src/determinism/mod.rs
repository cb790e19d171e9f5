//! Determinism primitives: canonical encoding and stable hashing.
//!
//! Everything that feeds a persisted identifier (module ids, content hashes)
//! goes through this module so that the byte-level contract lives in one place.

pub mod canonical_json;
pub mod hashing;
