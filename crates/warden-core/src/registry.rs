//! Ingestion index for the policies of one store.
//!
//! The registry attaches metadata to incoming policies, keys them by module id,
//! and uses the content hash to tell real edits from administrative ones.
//!
//! Requirements:
//! - stable ordering for lookups and iteration
//! - identity collisions block ingestion of the second policy
//! - no global mutable state

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::errors::{PolicyError, PolicyResult};
use crate::metadata;
use crate::model::v1::Policy;
use crate::namer::{self, ModuleId};
use crate::resolve::DefinitionSource;
use crate::wrapper::Wrapper;
use crate::{deps, kind::Kind};

/// What ingesting a policy did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// A module id not seen before.
    Added(ModuleId),
    /// An existing module whose content hash changed; dependents must be recompiled.
    Updated(ModuleId),
    /// An existing module with identical content (metadata may have changed).
    Unchanged(ModuleId),
}

impl Ingested {
    pub fn id(&self) -> ModuleId {
        match self {
            Self::Added(id) | Self::Updated(id) | Self::Unchanged(id) => *id,
        }
    }
}

/// Policies from a single store, keyed by module id.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    store_identifier: String,
    policies: BTreeMap<ModuleId, Policy>,
}

impl PolicyRegistry {
    /// Create an empty registry for the given store.
    pub fn new(store_identifier: impl Into<String>) -> Self {
        Self {
            store_identifier: store_identifier.into(),
            policies: BTreeMap::new(),
        }
    }

    pub fn store_identifier(&self) -> &str {
        &self.store_identifier
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Ingest a policy read from `source`.
    ///
    /// The content hash is always recomputed so that a stale hash carried by
    /// the incoming document cannot mask an edit.
    pub fn ingest(
        &mut self,
        policy: Policy,
        source: impl Into<String>,
        annotations: BTreeMap<String, String>,
    ) -> PolicyResult<Ingested> {
        let source = source.into();
        let policy = metadata::with_hash(policy)?;
        let policy = metadata::with_metadata(policy, source.as_str(), annotations, &self.store_identifier)?;

        let fqn = namer::fqn_of(&policy)?;
        let id = namer::module_id_of(&fqn);

        let outcome = match self.policies.get(&id) {
            None => Ingested::Added(id),
            Some(existing) => {
                let existing_fqn = namer::fqn_of(existing)?;
                if existing_fqn != fqn {
                    warn!(module_id = %id, existing = %existing_fqn, incoming = %fqn, source = %source, "module id collision");
                    return Err(PolicyError::ModuleIdentityCollision {
                        id,
                        existing: existing_fqn,
                        incoming: fqn,
                    });
                }
                if metadata::hash_of(existing)? == metadata::hash_of(&policy)? {
                    Ingested::Unchanged(id)
                } else {
                    Ingested::Updated(id)
                }
            }
        };

        debug!(module_id = %id, fqn = %fqn, source = %source, outcome = ?outcome, "ingested policy");
        self.policies.insert(id, policy);
        Ok(outcome)
    }

    pub fn get(&self, id: ModuleId) -> Option<&Policy> {
        self.policies.get(&id)
    }

    pub fn get_by_fqn(&self, fqn: &str) -> Option<&Policy> {
        let id = namer::module_id_of(fqn);
        self.policies
            .get(&id)
            .filter(|p| namer::fqn_of(p).map(|f| f == fqn).unwrap_or(false))
    }

    pub fn remove(&mut self, id: ModuleId) -> Option<Policy> {
        self.policies.remove(&id)
    }

    /// List module ids in deterministic order.
    pub fn list_ids(&self) -> Vec<ModuleId> {
        self.policies.keys().copied().collect()
    }

    /// Wrapped views of all policies of one kind, in module id order.
    pub fn list(&self, kind: Kind) -> Vec<Wrapper<'_>> {
        self.policies
            .values()
            .filter_map(|p| Wrapper::wrap(p).ok())
            .filter(|w| w.kind == kind)
            .collect()
    }

    /// Iterate over registered policies in deterministic id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ModuleId, &Policy)> {
        self.policies.iter()
    }

    /// Module ids of the policies that import `id`.
    pub fn dependents_of(&self, id: ModuleId) -> Vec<ModuleId> {
        self.policies
            .iter()
            .filter(|(_, p)| {
                Wrapper::wrap(p)
                    .map(|w| w.dependencies.contains(&id))
                    .unwrap_or(false)
            })
            .map(|(dep_id, _)| *dep_id)
            .collect()
    }

    /// Every distinct schema reference used by a registered policy.
    pub fn schema_references(&self) -> BTreeSet<String> {
        self.policies
            .values()
            .flat_map(deps::schema_references_of)
            .collect()
    }
}

impl DefinitionSource for PolicyRegistry {
    fn load(&self, id: ModuleId, _fqn: &str) -> anyhow::Result<Option<Policy>> {
        Ok(self.get(id).cloned())
    }
}
