//! Decoding helpers for policy documents.
//!
//! Store backends read bytes; these helpers turn them into [`Policy`] values
//! with a hard size limit and a strict `apiVersion` check. Decoding is
//! deterministic given the same bytes.
//!
//! A document with an unset or unrecognized variant still decodes. It is the
//! classifier's job to reject it, so the store can report it per policy.

use crate::errors::{PolicyError, PolicyResult};
use crate::model::v1::Policy;
use crate::version::ApiVersion;

/// Default maximum encoded policy size (4 MiB).
pub const DEFAULT_MAX_POLICY_BYTES: usize = 4 * 1024 * 1024;

fn check_size(bytes: &[u8], max_bytes: usize) -> PolicyResult<()> {
    if bytes.len() > max_bytes {
        return Err(PolicyError::invalid_argument(format!(
            "policy document too large ({} bytes > limit {})",
            bytes.len(),
            max_bytes
        )));
    }
    Ok(())
}

fn check_version(policy: Policy) -> PolicyResult<Policy> {
    ApiVersion::parse(&policy.api_version)?;
    Ok(policy)
}

/// Parse a JSON policy document.
pub fn parse_policy_json(bytes: &[u8], max_bytes: usize) -> PolicyResult<Policy> {
    check_size(bytes, max_bytes)?;
    let policy: Policy = serde_json::from_slice(bytes)
        .map_err(|e| PolicyError::serialization(format!("failed to parse policy JSON: {e}")))?;
    check_version(policy)
}

/// Parse a YAML policy document.
#[cfg(feature = "yaml")]
pub fn parse_policy_yaml(bytes: &[u8], max_bytes: usize) -> PolicyResult<Policy> {
    check_size(bytes, max_bytes)?;
    let policy: Policy = serde_yaml::from_slice(bytes)
        .map_err(|e| PolicyError::serialization(format!("failed to parse policy YAML: {e}")))?;
    check_version(policy)
}
