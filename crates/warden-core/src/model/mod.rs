//! warden data models.
//!
//! Policy documents are versioned: each document format lives under a `vN`
//! module so that a newer format can be introduced without breaking existing
//! callers. Models are mostly "dumb" data; identity, hashing, and dependency
//! rules are applied by the modules that consume them.
//!
//! Recommended imports:
//! - For most code: `use warden_core::model::v1::*;`
//! - Or: `use warden_core::prelude::*;`
//!
//! Canonical hashing never relies on `serde_json::to_vec` directly; it goes
//! through `crate::determinism::canonical_json`.

pub mod v1;

pub use v1::{
    DerivedRoles, Effect, Metadata, Policy, PolicyDocument, PolicyType, PrincipalAction,
    PrincipalPolicy, PrincipalRule, ResourcePolicy, ResourceRule, RoleDef, SchemaRef, Schemas,
};

/// Lightweight structural checks for model consumers.
///
/// These checks cover identity fields only. Conditions, role logic, and rule
/// semantics belong to the compiler and are not inspected here.
pub mod validate {
    use super::*;
    use crate::errors::{PolicyError, PolicyResult};

    /// Validate the fields that feed a policy's FQN.
    ///
    /// Names must be non-empty. Versions must be non-empty and must not
    /// contain `/`, so an FQN always splits unambiguously at its last `/`.
    pub fn identity_fields(policy_type: &PolicyType) -> PolicyResult<()> {
        match policy_type {
            PolicyType::Resource(rp) => versioned("resource", &rp.resource, &rp.version),
            PolicyType::Principal(pp) => versioned("principal", &pp.principal, &pp.version),
            PolicyType::DerivedRoles(dr) => {
                if dr.name.is_empty() {
                    return Err(PolicyError::invalid_argument(
                        "derived roles name must not be empty",
                    ));
                }
                Ok(())
            }
            PolicyType::Unrecognized { field, .. } => Err(PolicyError::unsupported_kind(
                format!("unrecognized policy variant `{field}`"),
            )),
        }
    }

    fn versioned(what: &str, name: &str, version: &str) -> PolicyResult<()> {
        if name.is_empty() {
            return Err(PolicyError::invalid_argument(format!(
                "{what} name must not be empty"
            )));
        }
        if version.is_empty() {
            return Err(PolicyError::invalid_argument(format!(
                "{what} `{name}` has an empty version"
            )));
        }
        if version.contains('/') {
            return Err(PolicyError::invalid_argument(format!(
                "{what} `{name}` version `{version}` must not contain '/'"
            )));
        }
        Ok(())
    }

}
