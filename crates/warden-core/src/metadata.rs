//! Provenance metadata and content hashing.
//!
//! The content hash covers the whole policy document except the fields listed
//! in [`IGNORE_HASH_FIELDS`]. Editing a description, toggling `disabled`, or
//! moving a file to another store leaves the hash unchanged; any change to
//! rules, imports, names, versions, variables, or schemas changes it.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::determinism::hashing;
use crate::errors::{PolicyError, PolicyResult};
use crate::model::v1::{Metadata, Policy, PolicyDocument};
use crate::namer;

/// Top-level document fields excluded from the content hash.
pub const IGNORE_HASH_FIELDS: [&str; 3] = ["metadata", "disabled", "description"];

/// Record provenance on a policy.
///
/// Source and annotations are always replaced. The store identifier is only
/// set when the policy does not carry one yet, and a hash is only computed
/// when none is present.
pub fn with_metadata(
    policy: Policy,
    source: impl Into<String>,
    annotations: BTreeMap<String, String>,
    store_identifier: &str,
) -> PolicyResult<Policy> {
    let mut policy = policy;
    let md = policy.metadata.get_or_insert_with(Metadata::default);
    md.source_file = Some(source.into());
    md.annotations = annotations;

    if md.store_identifier.as_deref().unwrap_or_default().is_empty() {
        policy = with_store_identifier(policy, store_identifier);
    }

    if policy.metadata.as_ref().and_then(|m| m.hash).is_none() {
        return with_hash(policy);
    }

    Ok(policy)
}

/// Set the store identifier unconditionally.
pub fn with_store_identifier(mut policy: Policy, store_identifier: &str) -> Policy {
    policy
        .metadata
        .get_or_insert_with(Metadata::default)
        .store_identifier = Some(store_identifier.to_string());
    policy
}

/// Compute the content hash and store it in metadata, replacing any old value.
pub fn with_hash(mut policy: Policy) -> PolicyResult<Policy> {
    let hash = content_hash(&policy)?;
    policy.metadata.get_or_insert_with(Metadata::default).hash = Some(hash);
    Ok(policy)
}

/// Compute the content hash of a policy, ignoring any stored value.
pub fn content_hash(policy: &Policy) -> PolicyResult<u64> {
    let doc = PolicyDocument::from(policy.clone());
    let mut value = serde_json::to_value(&doc)
        .map_err(|e| PolicyError::serialization(format!("failed to serialize policy: {e}")))?;

    let Value::Object(map) = &mut value else {
        return Err(PolicyError::invariant("policy did not serialize to an object"));
    };
    for field in IGNORE_HASH_FIELDS {
        map.remove(field);
    }

    hashing::hash_canonical_json(crate::domain::POLICY_CONTENT, &value)
}

/// The stored hash, or a freshly computed one when none is stored.
pub fn hash_of(policy: &Policy) -> PolicyResult<u64> {
    match policy.metadata.as_ref().and_then(|m| m.hash) {
        Some(h) => Ok(h),
        None => content_hash(policy),
    }
}

/// Like [`hash_of`], but caches a computed hash on the policy.
pub fn ensure_hash(policy: &mut Policy) -> PolicyResult<u64> {
    if let Some(h) = policy.metadata.as_ref().and_then(|m| m.hash) {
        return Ok(h);
    }
    let h = content_hash(policy)?;
    policy.metadata.get_or_insert_with(Metadata::default).hash = Some(h);
    Ok(h)
}

/// Hex rendering of [`hash_of`], as embedded in decision logs.
pub fn hash_hex(policy: &Policy) -> PolicyResult<String> {
    hash_of(policy).map(hashing::hash_hex)
}

/// Where a policy came from, or a placeholder naming it.
pub fn source_file_of(policy: Option<&Policy>) -> String {
    let Some(p) = policy else {
        return "unknown<nil>".to_string();
    };

    match p.metadata.as_ref().and_then(|m| m.source_file.as_deref()) {
        Some(src) if !src.is_empty() => src.to_string(),
        _ => match namer::fqn_of(p) {
            Ok(fqn) => format!("unknown<{fqn}>"),
            Err(_) => "unknown<unclassified>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::v1::{Effect, ResourcePolicy, ResourceRule};

    fn album() -> Policy {
        Policy::resource(ResourcePolicy {
            resource: "album:view".into(),
            version: "default".into(),
            import_derived_roles: vec!["common_roles".into()],
            rules: vec![ResourceRule {
                actions: vec!["view".into()],
                effect: Effect::Allow,
                derived_roles: vec!["owner".into()],
                ..Default::default()
            }],
            schemas: None,
        })
    }

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn with_metadata_sets_fields_and_hash() {
        let p = with_metadata(album(), "album.yaml", annotations(&[("team", "photos")]), "disk").unwrap();
        let md = p.metadata.as_ref().unwrap();
        assert_eq!(md.source_file.as_deref(), Some("album.yaml"));
        assert_eq!(md.annotations.get("team").map(String::as_str), Some("photos"));
        assert_eq!(md.store_identifier.as_deref(), Some("disk"));
        assert_eq!(md.hash, Some(content_hash(&album()).unwrap()));
    }

    #[test]
    fn store_identifier_never_overwritten() {
        let once = with_metadata(album(), "a.yaml", BTreeMap::new(), "disk").unwrap();
        let twice = with_metadata(once, "b.yaml", BTreeMap::new(), "git").unwrap();
        let md = twice.metadata.unwrap();
        assert_eq!(md.store_identifier.as_deref(), Some("disk"));
        assert_eq!(md.source_file.as_deref(), Some("b.yaml"));
    }

    #[test]
    fn existing_hash_is_kept_by_with_metadata() {
        let mut p = album();
        p.metadata = Some(Metadata {
            hash: Some(42),
            ..Default::default()
        });
        let p = with_metadata(p, "a.yaml", BTreeMap::new(), "disk").unwrap();
        assert_eq!(hash_of(&p).unwrap(), 42);
        // with_hash always recomputes
        let p = with_hash(p).unwrap();
        assert_eq!(hash_of(&p).unwrap(), content_hash(&album()).unwrap());
    }

    #[test]
    fn administrative_fields_do_not_affect_hash() {
        let base = album();
        let mut edited = with_metadata(album(), "elsewhere.yaml", annotations(&[("x", "y")]), "blob").unwrap();
        edited.description = "now with a description".into();
        edited.disabled = true;
        assert_eq!(content_hash(&base).unwrap(), content_hash(&edited).unwrap());
    }

    #[test]
    fn content_changes_affect_hash() {
        let base = content_hash(&album()).unwrap();

        let mut p = album();
        p.variables.insert("is_owner".into(), "request.resource.attr.owner == request.principal.id".into());
        assert_ne!(base, content_hash(&p).unwrap());

        let mut p = album();
        p.api_version = "api.warden.dev/v2".into();
        assert_ne!(base, content_hash(&p).unwrap());
    }

    #[test]
    fn ensure_hash_caches() {
        let mut p = album();
        let h = ensure_hash(&mut p).unwrap();
        assert_eq!(p.metadata.as_ref().and_then(|m| m.hash), Some(h));
        assert_eq!(hash_hex(&p).unwrap(), hashing::hash_hex(h));
    }

    #[test]
    fn source_file_placeholders() {
        assert_eq!(source_file_of(None), "unknown<nil>");
        assert_eq!(source_file_of(Some(&album())), "unknown<resource.album:view/default>");
        assert_eq!(source_file_of(Some(&Policy::default())), "unknown<unclassified>");

        let p = with_metadata(album(), "policies/album.yaml", BTreeMap::new(), "disk").unwrap();
        assert_eq!(source_file_of(Some(&p)), "policies/album.yaml");
    }
}
