//! Stable hashing utilities.
//!
//! All identifiers in warden are XXH64 digests with seed 0:
//! - module ids hash the raw FQN bytes (no domain label)
//! - content hashes are domain-separated (`crate::domain::POLICY_CONTENT`)
//!
//! XXH64 is non-cryptographic and identical across platforms, processes and
//! runs. Persisted hashes and decision-log entries depend on it, so the
//! algorithm and seed must not change without a migration.

use serde_json::Value;
use xxhash_rust::xxh64::{xxh64, Xxh64};

use crate::determinism::canonical_json;
use crate::errors::PolicyResult;

/// Seed used for every hash in this crate.
pub const SEED: u64 = 0;

/// Hash raw bytes.
pub fn hash64(bytes: &[u8]) -> u64 {
    xxh64(bytes, SEED)
}

/// Hash bytes prefixed with a domain label.
pub fn hash64_with_domain(domain: &str, bytes: &[u8]) -> u64 {
    let mut h = Xxh64::new(SEED);
    h.update(domain.as_bytes());
    h.update(bytes);
    h.digest()
}

/// Hash the canonical encoding of a JSON value under a domain label.
pub fn hash_canonical_json(domain: &str, value: &Value) -> PolicyResult<u64> {
    let bytes = canonical_json::to_canonical_bytes(value)?;
    Ok(hash64_with_domain(domain, &bytes))
}

/// Render a hash as 16 lowercase hex digits (big-endian).
pub fn hash_hex(hash: u64) -> String {
    hex::encode(hash.to_be_bytes())
}
