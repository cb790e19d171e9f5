//! Compile-time dependency and schema reference extraction.
//!
//! Only resource policies import anything: derived-role sets by name and,
//! optionally, a principal and a resource schema. Existence of the referenced
//! modules is not checked here.

use crate::model::v1::{Policy, PolicyType};
use crate::namer;

/// FQNs of the derived-role sets a policy imports, in declaration order.
pub fn dependencies_of(policy: &Policy) -> Vec<String> {
    match &policy.policy_type {
        Some(PolicyType::Resource(rp)) => rp
            .import_derived_roles
            .iter()
            .map(|name| namer::derived_roles_fqn(name))
            .collect(),
        _ => Vec::new(),
    }
}

/// Schema references of a policy: principal schema first, then resource
/// schema. Empty references are omitted.
pub fn schema_references_of(policy: &Policy) -> Vec<String> {
    let Some(PolicyType::Resource(rp)) = &policy.policy_type else {
        return Vec::new();
    };
    let Some(schemas) = &rp.schemas else {
        return Vec::new();
    };

    [&schemas.principal_schema, &schemas.resource_schema]
        .into_iter()
        .flatten()
        .filter(|s| !s.reference.is_empty())
        .map(|s| s.reference.clone())
        .collect()
}
