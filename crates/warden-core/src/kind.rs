//! Policy kind classification.
//!
//! Every other component starts by asking which variant a policy is. An unset
//! or unrecognized variant is reported as `UnsupportedKind`; it never panics,
//! because a single forward-incompatible policy must not take down the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{PolicyError, PolicyResult};
use crate::model::v1::{Policy, PolicyType};

/// The kind of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    Resource,
    Principal,
    DerivedRoles,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Resource, Kind::Principal, Kind::DerivedRoles];

    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "RESOURCE",
            Self::Principal => "PRINCIPAL",
            Self::DerivedRoles => "DERIVED_ROLES",
        }
    }

    /// Return the FQN prefix for this kind (without the trailing dot).
    pub fn fqn_prefix(&self) -> &'static str {
        match self {
            Self::Resource => crate::domain::RESOURCE_PREFIX,
            Self::Principal => crate::domain::PRINCIPAL_PREFIX,
            Self::DerivedRoles => crate::domain::DERIVED_ROLES_PREFIX,
        }
    }

    /// Whether FQNs of this kind carry a version segment.
    pub fn is_versioned(&self) -> bool {
        !matches!(self, Self::DerivedRoles)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RESOURCE" => Ok(Self::Resource),
            "PRINCIPAL" => Ok(Self::Principal),
            "DERIVED_ROLES" => Ok(Self::DerivedRoles),
            _ => Err(PolicyError::unsupported_kind(format!("unknown kind `{s}`"))),
        }
    }
}

/// Classify a policy by its populated variant.
pub fn kind_of(policy: &Policy) -> PolicyResult<Kind> {
    match &policy.policy_type {
        Some(PolicyType::Resource(_)) => Ok(Kind::Resource),
        Some(PolicyType::Principal(_)) => Ok(Kind::Principal),
        Some(PolicyType::DerivedRoles(_)) => Ok(Kind::DerivedRoles),
        Some(PolicyType::Unrecognized { field, .. }) => Err(PolicyError::unsupported_kind(
            format!("unrecognized policy variant `{field}`"),
        )),
        None => Err(PolicyError::unsupported_kind("policy variant is unset")),
    }
}
