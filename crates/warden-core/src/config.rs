//! Configuration structures for warden-core.
//!
//! Configuration is explicit and passed in by the caller (store adapters,
//! compiler front-ends). The core crate does not read environment variables.
//!
//! Hashing is deliberately not configurable: module ids and content hashes are
//! persisted and must stay comparable across deployments.

use crate::errors::{PolicyError, PolicyResult};

/// Global configuration container.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub limits: LimitsConfig,
}

/// Resource limits applied while decoding and assembling.
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Largest encoded policy document accepted by `crate::parse`.
    pub max_policy_bytes: usize,
    /// Largest number of definitions in a single compilation unit.
    pub max_unit_definitions: usize,
    /// Largest number of derived-role imports in one resource policy.
    pub max_imports: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_policy_bytes: crate::parse::DEFAULT_MAX_POLICY_BYTES,
            max_unit_definitions: 1_024,
            max_imports: 256,
        }
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &CoreConfig) -> PolicyResult<()> {
    if cfg.limits.max_policy_bytes == 0 {
        return Err(PolicyError::invalid_argument(
            "max_policy_bytes must be greater than zero",
        ));
    }

    if cfg.limits.max_unit_definitions == 0 {
        return Err(PolicyError::invalid_argument(
            "max_unit_definitions must be greater than zero",
        ));
    }

    // A unit holds the main policy plus at most one definition per import.
    if cfg.limits.max_imports >= cfg.limits.max_unit_definitions {
        return Err(PolicyError::invalid_argument(
            "max_imports must be smaller than max_unit_definitions",
        ));
    }

    Ok(())
}
