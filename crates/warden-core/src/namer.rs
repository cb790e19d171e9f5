//! Fully-qualified names and module ids.
//!
//! FQN grammar:
//! - resource policy: `resource.<name>/<version>`
//! - principal policy: `principal.<name>/<version>`
//! - derived roles: `derived_roles.<name>`
//!
//! A [`ModuleId`] is the XXH64 digest of the FQN bytes. Equal FQNs always give
//! equal ids; two different FQNs sharing an id is a collision that callers
//! must reject (see `PolicyError::ModuleIdentityCollision`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::determinism::hashing;
use crate::errors::{PolicyError, PolicyResult};
use crate::model::v1::{Policy, PolicyType};
use crate::model::validate;

/// Numeric module identifier derived from an FQN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(u64);

impl ModuleId {
    /// Wrap a raw value, e.g. one read back from a decision log.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hashing::hash_hex(self.0))
    }
}

pub fn resource_policy_fqn(resource: &str, version: &str) -> String {
    format!("{}.{resource}/{version}", crate::domain::RESOURCE_PREFIX)
}

pub fn principal_policy_fqn(principal: &str, version: &str) -> String {
    format!("{}.{principal}/{version}", crate::domain::PRINCIPAL_PREFIX)
}

pub fn derived_roles_fqn(name: &str) -> String {
    format!("{}.{name}", crate::domain::DERIVED_ROLES_PREFIX)
}

/// Derive the module id for an FQN.
pub fn module_id_of(fqn: &str) -> ModuleId {
    ModuleId(hashing::hash64(fqn.as_bytes()))
}

/// Build the FQN of a policy.
///
/// Fails with `UnsupportedKind` for unset or unrecognized variants and with
/// `InvalidArgument` when the identity fields would make the FQN ambiguous.
pub fn fqn_of(policy: &Policy) -> PolicyResult<String> {
    let kind = crate::kind::kind_of(policy)?;
    let pt = policy.policy_type.as_ref().ok_or_else(|| {
        PolicyError::invariant(format!("policy classified as {kind} has no variant"))
    })?;
    validate::identity_fields(pt)?;

    match pt {
        PolicyType::Resource(rp) => Ok(resource_policy_fqn(&rp.resource, &rp.version)),
        PolicyType::Principal(pp) => Ok(principal_policy_fqn(&pp.principal, &pp.version)),
        PolicyType::DerivedRoles(dr) => Ok(derived_roles_fqn(&dr.name)),
        PolicyType::Unrecognized { field, .. } => Err(PolicyError::unsupported_kind(format!(
            "unrecognized policy variant `{field}`"
        ))),
    }
}

/// Human readable key for a policy: its FQN, or a placeholder when it has none.
pub fn policy_key(policy: Option<&Policy>) -> String {
    match policy {
        None => "unknown<nil>".to_string(),
        Some(p) => fqn_of(p).unwrap_or_else(|_| "unknown<unclassified>".to_string()),
    }
}
