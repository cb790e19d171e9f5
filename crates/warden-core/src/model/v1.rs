//! Policy document model, version 1.
//!
//! The wire form keeps one optional field per variant (`resourcePolicy`,
//! `principalPolicy`, `derivedRoles`). In memory a policy carries a single
//! [`PolicyType`]. Conversion happens in [`PolicyDocument`]:
//! - more than one known variant populated: rejected at decode
//! - no known variant, but an unknown object-valued field: kept as
//!   [`PolicyType::Unrecognized`] so that classification can report it
//! - nothing populated: `policy_type` is `None`
//!
//! Other unknown top-level fields are dropped (and logged at debug level), so
//! they take no part in the content hash. Unknown fields inside a known variant
//! are ignored by serde.
//!
//! Empty collections and unset optionals are omitted on serialization. The
//! content hash relies on this: an omitted list and an empty list hash alike.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::PolicyError;

/// A single policy definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyDocument", into = "PolicyDocument")]
pub struct Policy {
    pub api_version: String,
    pub description: String,
    pub disabled: bool,
    pub variables: BTreeMap<String, String>,
    pub metadata: Option<Metadata>,
    pub policy_type: Option<PolicyType>,
}

impl Policy {
    /// Create a policy of the given variant with the current api version.
    pub fn new(policy_type: PolicyType) -> Self {
        Self {
            api_version: crate::API_VERSION_V1.to_string(),
            policy_type: Some(policy_type),
            ..Self::default()
        }
    }

    pub fn resource(rp: ResourcePolicy) -> Self {
        Self::new(PolicyType::Resource(rp))
    }

    pub fn principal(pp: PrincipalPolicy) -> Self {
        Self::new(PolicyType::Principal(pp))
    }

    pub fn derived_roles(dr: DerivedRoles) -> Self {
        Self::new(PolicyType::DerivedRoles(dr))
    }
}

/// The populated policy variant.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyType {
    Resource(ResourcePolicy),
    Principal(PrincipalPolicy),
    DerivedRoles(DerivedRoles),
    /// A variant this engine does not know, e.g. written by a newer producer.
    Unrecognized { field: String, body: Value },
}

/// Administrative metadata. Never part of a policy's identity or content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePolicy {
    pub resource: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_derived_roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ResourceRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Schemas>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub actions: Vec<String>,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_roles: Vec<String>,
    /// Condition expression tree. Opaque at this layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    #[serde(rename = "EFFECT_ALLOW")]
    Allow,
    #[serde(rename = "EFFECT_DENY")]
    Deny,
}

/// Schema references declared by a resource policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schemas {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_schema: Option<SchemaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_schema: Option<SchemaRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    #[serde(rename = "ref", default)]
    pub reference: String,
}

impl SchemaRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalPolicy {
    pub principal: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<PrincipalRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalRule {
    pub resource: String,
    pub actions: Vec<PrincipalAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalAction {
    pub action: String,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRoles {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub definitions: Vec<RoleDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDef {
    pub name: String,
    pub parent_roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

/// Wire form of a policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_policy: Option<ResourcePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_policy: Option<PrincipalPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_roles: Option<DerivedRoles>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl TryFrom<PolicyDocument> for Policy {
    type Error = PolicyError;

    fn try_from(doc: PolicyDocument) -> Result<Self, Self::Error> {
        let populated: Vec<&str> = [
            ("resourcePolicy", doc.resource_policy.is_some()),
            ("principalPolicy", doc.principal_policy.is_some()),
            ("derivedRoles", doc.derived_roles.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect();

        if populated.len() > 1 {
            return Err(PolicyError::invalid_argument(format!(
                "policy populates more than one variant: {}",
                populated.join(", ")
            )));
        }

        let known = if let Some(rp) = doc.resource_policy {
            Some(PolicyType::Resource(rp))
        } else if let Some(pp) = doc.principal_policy {
            Some(PolicyType::Principal(pp))
        } else {
            doc.derived_roles.map(PolicyType::DerivedRoles)
        };

        let (policy_type, discarded): (Option<PolicyType>, Vec<String>) = match known {
            Some(pt) => (Some(pt), doc.other.into_keys().collect()),
            None => split_unrecognized(doc.other),
        };
        if !discarded.is_empty() {
            debug!(fields = ?discarded, "ignoring unknown top-level fields");
        }

        Ok(Policy {
            api_version: doc.api_version,
            description: doc.description,
            disabled: doc.disabled,
            variables: doc.variables,
            metadata: doc.metadata,
            policy_type,
        })
    }
}

/// Pick the first object-valued unknown field as the policy variant. Returns
/// the names of the fields that are dropped.
fn split_unrecognized(other: BTreeMap<String, Value>) -> (Option<PolicyType>, Vec<String>) {
    let mut variant = None;
    let mut discarded = Vec::new();
    for (field, body) in other {
        if variant.is_none() && body.is_object() {
            variant = Some(PolicyType::Unrecognized { field, body });
        } else {
            discarded.push(field);
        }
    }
    (variant, discarded)
}

impl From<Policy> for PolicyDocument {
    fn from(p: Policy) -> Self {
        let mut doc = PolicyDocument {
            api_version: p.api_version,
            description: p.description,
            disabled: p.disabled,
            variables: p.variables,
            metadata: p.metadata,
            ..PolicyDocument::default()
        };

        match p.policy_type {
            Some(PolicyType::Resource(rp)) => doc.resource_policy = Some(rp),
            Some(PolicyType::Principal(pp)) => doc.principal_policy = Some(pp),
            Some(PolicyType::DerivedRoles(dr)) => doc.derived_roles = Some(dr),
            Some(PolicyType::Unrecognized { field, body }) => {
                doc.other.insert(field, body);
            }
            None => {}
        }

        doc
    }
}
