//! Version helpers.
//!
//! Centralizes parsing of the policy document `apiVersion` field. Strict: an
//! unknown version is an error, not a best-effort decode.

use crate::errors::{PolicyError, PolicyResult};

/// Known policy document versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
}

impl ApiVersion {
    /// Parse an api version string (e.g. "api.warden.dev/v1").
    pub fn parse(s: &str) -> PolicyResult<Self> {
        match s {
            crate::API_VERSION_V1 => Ok(Self::V1),
            _ => Err(PolicyError::invalid_argument(format!(
                "unsupported api version: {s}"
            ))),
        }
    }

    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => crate::API_VERSION_V1,
        }
    }
}
