//! Augmented read-only view over a policy.

use crate::deps;
use crate::errors::{PolicyError, PolicyResult};
use crate::kind::{kind_of, Kind};
use crate::model::v1::{Policy, PolicyType};
use crate::namer::{self, ModuleId};

/// A policy together with its derived identity.
///
/// Borrowed from the policy it describes and recomputed on demand, so it can
/// never drift from the definition.
#[derive(Debug, Clone)]
pub struct Wrapper<'a> {
    pub policy: &'a Policy,
    pub fqn: String,
    pub kind: Kind,
    pub name: &'a str,
    /// Empty for derived roles.
    pub version: &'a str,
    pub id: ModuleId,
    /// Module ids of imported definitions, in declaration order.
    pub dependencies: Vec<ModuleId>,
}

impl<'a> Wrapper<'a> {
    pub fn wrap(policy: &'a Policy) -> PolicyResult<Self> {
        let kind = kind_of(policy)?;
        let fqn = namer::fqn_of(policy)?;

        let (name, version) = match &policy.policy_type {
            Some(PolicyType::Resource(rp)) => (rp.resource.as_str(), rp.version.as_str()),
            Some(PolicyType::Principal(pp)) => (pp.principal.as_str(), pp.version.as_str()),
            Some(PolicyType::DerivedRoles(dr)) => (dr.name.as_str(), ""),
            _ => {
                return Err(PolicyError::invariant(format!(
                    "policy classified as {kind} has no matching variant"
                )))
            }
        };

        let dependencies = deps::dependencies_of(policy)
            .iter()
            .map(|fqn| namer::module_id_of(fqn))
            .collect();

        Ok(Self {
            policy,
            id: namer::module_id_of(&fqn),
            fqn,
            kind,
            name,
            version,
            dependencies,
        })
    }

    /// FQNs of the imported definitions, parallel to `dependencies`.
    pub fn dependency_fqns(&self) -> Vec<String> {
        deps::dependencies_of(self.policy)
    }
}

/// Wrap a batch of policies. Each result is independent of the others.
#[cfg(not(feature = "parallel"))]
pub fn wrap_all(policies: &[Policy]) -> Vec<PolicyResult<Wrapper<'_>>> {
    policies.iter().map(Wrapper::wrap).collect()
}

/// Wrap a batch of policies. Each result is independent of the others.
#[cfg(feature = "parallel")]
pub fn wrap_all(policies: &[Policy]) -> Vec<PolicyResult<Wrapper<'_>>> {
    use rayon::prelude::*;
    policies.par_iter().map(Wrapper::wrap).collect()
}
