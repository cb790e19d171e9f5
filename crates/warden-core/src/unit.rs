//! Compilation units.
//!
//! A [`CompilationUnit`] is built incrementally: the caller walks the
//! dependency graph from the main policy and adds each definition it finds.
//! Once every referenced module is present, [`CompilationUnit::seal`] turns it
//! into a [`CompleteUnit`], the only form a compiler should accept.
//!
//! Re-adding a module id is accepted only when it is the same definition
//! (same FQN, same content hash). A different FQN is an identity collision; the
//! same FQN with different content is a conflict.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;

use tracing::debug;

use crate::errors::{PolicyError, PolicyResult};
use crate::metadata;
use crate::model::v1::Policy;
use crate::namer::{self, ModuleId};
use crate::wrapper::Wrapper;

/// The main policy plus the definitions it depends on, keyed by module id.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    definitions: BTreeMap<ModuleId, Policy>,
    mod_id: ModuleId,
}

impl CompilationUnit {
    /// Start a unit for the given main module.
    pub fn new(main: ModuleId) -> Self {
        Self {
            definitions: BTreeMap::new(),
            mod_id: main,
        }
    }

    pub fn mod_id(&self) -> ModuleId {
        self.mod_id
    }

    pub fn definitions(&self) -> &BTreeMap<ModuleId, Policy> {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.definitions.contains_key(&id)
    }

    /// Add a definition under an explicit id.
    ///
    /// The id must be the one derived from the policy's FQN.
    pub fn add_definition(&mut self, id: ModuleId, policy: Policy) -> PolicyResult<()> {
        let fqn = namer::fqn_of(&policy)?;
        let derived = namer::module_id_of(&fqn);
        if derived != id {
            return Err(PolicyError::invalid_argument(format!(
                "module id {id} does not match `{fqn}` (expected {derived})"
            )));
        }
        self.insert(id, fqn, policy)
    }

    /// Add a definition under its derived id and return that id.
    pub fn add_policy(&mut self, policy: Policy) -> PolicyResult<ModuleId> {
        let fqn = namer::fqn_of(&policy)?;
        let id = namer::module_id_of(&fqn);
        self.insert(id, fqn, policy)?;
        Ok(id)
    }

    fn insert(&mut self, id: ModuleId, fqn: String, policy: Policy) -> PolicyResult<()> {
        if let Some(existing) = self.definitions.get(&id) {
            let existing_fqn = namer::fqn_of(existing)?;
            if existing_fqn != fqn {
                return Err(PolicyError::ModuleIdentityCollision {
                    id,
                    existing: existing_fqn,
                    incoming: fqn,
                });
            }

            // Stored hashes come from the document and may be stale.
            let existing_hash = metadata::content_hash(existing)?;
            let incoming_hash = metadata::content_hash(&policy)?;
            if existing_hash != incoming_hash {
                return Err(PolicyError::DefinitionConflict {
                    id,
                    fqn,
                    existing_hash,
                    incoming_hash,
                });
            }

            debug!(module_id = %id, fqn = %fqn, "definition already present");
            return Ok(());
        }

        debug!(module_id = %id, fqn = %fqn, "adding definition");
        self.definitions.insert(id, policy);
        Ok(())
    }

    pub fn main_policy(&self) -> Option<&Policy> {
        self.definitions.get(&self.mod_id)
    }

    /// Human readable identifier of the main policy.
    pub fn key(&self) -> String {
        namer::policy_key(self.main_policy())
    }

    pub fn source_file(&self) -> String {
        metadata::source_file_of(self.main_policy())
    }

    /// Dependencies referenced by some definition but not present, as
    /// `(module id, fqn)` pairs in deterministic order. A missing main policy
    /// is not included; see [`CompilationUnit::check_complete`].
    ///
    /// Fails with `ModuleIdentityCollision` when a dependency's id is held by
    /// a definition with another FQN.
    pub fn missing_dependencies(&self) -> PolicyResult<Vec<(ModuleId, String)>> {
        let mut missing = BTreeMap::new();
        for policy in self.definitions.values() {
            let w = Wrapper::wrap(policy)?;
            for (id, fqn) in w.dependencies.iter().zip(w.dependency_fqns()) {
                match self.definitions.get(id) {
                    None => {
                        missing.entry(*id).or_insert(fqn);
                    }
                    Some(present) => {
                        let present_fqn = namer::fqn_of(present)?;
                        if present_fqn != fqn {
                            return Err(PolicyError::ModuleIdentityCollision {
                                id: *id,
                                existing: present_fqn,
                                incoming: fqn,
                            });
                        }
                    }
                }
            }
        }
        Ok(missing.into_iter().collect())
    }

    pub fn is_complete(&self) -> bool {
        self.check_complete().is_ok()
    }

    /// Fail with `IncompleteCompilationUnit` unless the main policy and every
    /// referenced dependency are present.
    pub fn check_complete(&self) -> PolicyResult<()> {
        if self.main_policy().is_none() {
            return Err(PolicyError::IncompleteCompilationUnit {
                unit: self.key(),
                missing: self.mod_id,
                fqn: "<main policy>".to_string(),
            });
        }

        if let Some((missing, fqn)) = self.missing_dependencies()?.into_iter().next() {
            return Err(PolicyError::IncompleteCompilationUnit {
                unit: self.key(),
                missing,
                fqn,
            });
        }

        Ok(())
    }

    /// Dependency edges between the unit's definitions.
    fn graph(&self) -> PolicyResult<BTreeMap<ModuleId, Vec<ModuleId>>> {
        self.definitions
            .iter()
            .map(|(id, p)| Wrapper::wrap(p).map(|w| (*id, w.dependencies)))
            .collect()
    }

    /// Verify completeness and acyclicity, producing a unit fit for compilation.
    pub fn seal(self) -> PolicyResult<CompleteUnit> {
        self.check_complete()?;

        if let Some(cycle) = find_cycle(&self.graph()?) {
            let cycle = cycle
                .into_iter()
                .map(|id| match self.definitions.get(&id) {
                    Some(p) => namer::policy_key(Some(p)),
                    None => id.to_string(),
                })
                .collect();
            return Err(PolicyError::CyclicDependency { cycle });
        }

        debug!(unit = %self.key(), definitions = self.len(), "compilation unit sealed");
        Ok(CompleteUnit(self))
    }
}

/// A compilation unit whose dependencies are all present and acyclic.
#[derive(Debug, Clone)]
pub struct CompleteUnit(CompilationUnit);

impl CompleteUnit {
    pub fn into_inner(self) -> CompilationUnit {
        self.0
    }
}

impl Deref for CompleteUnit {
    type Target = CompilationUnit;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Find a cycle in a dependency graph, returned as a path that starts and
/// ends at the same node. Edges to nodes outside the graph are ignored.
pub fn find_cycle(graph: &BTreeMap<ModuleId, Vec<ModuleId>>) -> Option<Vec<ModuleId>> {
    let mut done: BTreeSet<ModuleId> = BTreeSet::new();

    for &start in graph.keys() {
        if done.contains(&start) {
            continue;
        }

        // Iterative DFS; `path` mirrors the stack of nodes being visited.
        let mut path: Vec<ModuleId> = vec![start];
        let mut on_path: BTreeSet<ModuleId> = BTreeSet::from([start]);
        let mut cursors: Vec<usize> = vec![0];

        while let Some(&node) = path.last() {
            let edges = graph.get(&node).map(Vec::as_slice).unwrap_or_default();
            let cursor = cursors.last_mut()?;

            if *cursor < edges.len() {
                let next = edges[*cursor];
                *cursor += 1;

                if on_path.contains(&next) {
                    let from = path.iter().position(|n| *n == next)?;
                    let mut cycle = path[from..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                if graph.contains_key(&next) && !done.contains(&next) {
                    path.push(next);
                    on_path.insert(next);
                    cursors.push(0);
                }
            } else {
                path.pop();
                cursors.pop();
                on_path.remove(&node);
                done.insert(node);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::v1::{DerivedRoles, Metadata, PrincipalPolicy, ResourcePolicy, RoleDef};
    use assert_matches::assert_matches;

    fn resource(name: &str, imports: &[&str]) -> Policy {
        Policy::resource(ResourcePolicy {
            resource: name.into(),
            version: "v1".into(),
            import_derived_roles: imports.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    fn derived(name: &str) -> Policy {
        Policy::derived_roles(DerivedRoles {
            name: name.into(),
            definitions: vec![],
        })
    }

    #[test]
    fn resource_with_derived_roles_has_two_entries() {
        let main = namer::module_id_of("resource.R/v1");
        let dr = namer::module_id_of("derived_roles.D");

        let mut cu = CompilationUnit::new(main);
        cu.add_definition(main, resource("R", &["D"])).unwrap();
        assert!(!cu.is_complete());
        cu.add_definition(dr, derived("D")).unwrap();

        let sealed = cu.seal().unwrap();
        assert_eq!(sealed.len(), 2);
        assert_eq!(sealed.mod_id(), main);
        assert!(sealed.contains(main) && sealed.contains(dr));
        assert_eq!(sealed.key(), "resource.R/v1");
        assert_eq!(sealed.source_file(), "unknown<resource.R/v1>");
    }

    #[test]
    fn missing_dependency_is_named() {
        let mut cu = CompilationUnit::new(namer::module_id_of("resource.R/v1"));
        cu.add_policy(resource("R", &["D", "E"])).unwrap();
        cu.add_policy(derived("E")).unwrap();

        let err = cu.seal().unwrap_err();
        match err {
            PolicyError::IncompleteCompilationUnit { unit, missing, fqn } => {
                assert_eq!(unit, "resource.R/v1");
                assert_eq!(missing, namer::module_id_of("derived_roles.D"));
                assert_eq!(fqn, "derived_roles.D");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_main_policy_is_incomplete() {
        let cu = CompilationUnit::new(namer::module_id_of("resource.R/v1"));
        assert!(cu.main_policy().is_none());
        assert_eq!(cu.key(), "unknown<nil>");
        assert_eq!(cu.source_file(), "unknown<nil>");
        assert_matches!(cu.check_complete(), Err(PolicyError::IncompleteCompilationUnit { .. }));
    }

    #[test]
    fn mismatched_id_rejected() {
        let mut cu = CompilationUnit::new(namer::module_id_of("resource.R/v1"));
        let err = cu
            .add_definition(namer::module_id_of("derived_roles.D"), resource("R", &[]))
            .unwrap_err();
        assert_matches!(err, PolicyError::InvalidArgument(_));
    }

    #[test]
    fn readding_same_definition_is_a_noop() {
        let mut cu = CompilationUnit::new(namer::module_id_of("resource.R/v1"));
        cu.add_policy(derived("D")).unwrap();
        let mut copy = derived("D");
        copy.description = "only the description changed".into();
        cu.add_policy(copy).unwrap();
        assert_eq!(cu.len(), 1);
    }

    #[test]
    fn readding_different_content_conflicts() {
        let mut cu = CompilationUnit::new(namer::module_id_of("resource.R/v1"));
        cu.add_policy(resource("R", &["D"])).unwrap();
        let err = cu.add_policy(resource("R", &["E"])).unwrap_err();
        assert_matches!(err, PolicyError::DefinitionConflict { .. });
    }

    fn derived_with_hash(parent: &str, stored: Option<u64>) -> Policy {
        let mut p = Policy::derived_roles(DerivedRoles {
            name: "D".into(),
            definitions: vec![RoleDef {
                name: "owner".into(),
                parent_roles: vec![parent.into()],
                condition: None,
            }],
        });
        p.metadata = stored.map(|hash| Metadata {
            hash: Some(hash),
            ..Default::default()
        });
        p
    }

    #[test]
    fn stored_hash_does_not_hide_a_conflict() {
        let mut cu = CompilationUnit::new(namer::module_id_of("resource.R/v1"));
        cu.add_policy(derived_with_hash("user", Some(42))).unwrap();
        let err = cu.add_policy(derived_with_hash("admin", Some(42))).unwrap_err();
        match err {
            PolicyError::DefinitionConflict {
                existing_hash,
                incoming_hash,
                ..
            } => {
                assert_ne!(existing_hash, 42);
                assert_ne!(existing_hash, incoming_hash);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let kept = cu.definitions().values().next().unwrap();
        assert_eq!(kept, &derived_with_hash("user", Some(42)));
    }

    #[test]
    fn stale_stored_hashes_do_not_conflict() {
        let mut cu = CompilationUnit::new(namer::module_id_of("resource.R/v1"));
        cu.add_policy(derived_with_hash("user", Some(1))).unwrap();
        cu.add_policy(derived_with_hash("user", Some(2))).unwrap();
        assert_eq!(cu.len(), 1);
    }

    #[test]
    fn dependency_id_held_by_another_fqn_is_a_collision() {
        let main = namer::module_id_of("resource.R/v1");
        let mut cu = CompilationUnit::new(main);
        cu.add_policy(resource("R", &["D"])).unwrap();
        // Stand-in for a real XXH64 collision: `derived_roles.E` stored
        // under the id of `derived_roles.D`.
        cu.definitions
            .insert(namer::module_id_of("derived_roles.D"), derived("E"));

        match cu.seal().unwrap_err() {
            PolicyError::ModuleIdentityCollision {
                existing, incoming, ..
            } => {
                assert_eq!(existing, "derived_roles.E");
                assert_eq!(incoming, "derived_roles.D");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn principal_policy_unit_is_complete_alone() {
        let p = Policy::principal(PrincipalPolicy {
            principal: "donald_duck".into(),
            version: "default".into(),
            rules: vec![],
        });
        let mut cu = CompilationUnit::new(namer::module_id_of("principal.donald_duck/default"));
        cu.add_policy(p).unwrap();
        assert!(cu.seal().is_ok());
    }

    #[test]
    fn find_cycle_reports_path() {
        let a = ModuleId::from_raw(1);
        let b = ModuleId::from_raw(2);
        let c = ModuleId::from_raw(3);
        let graph = BTreeMap::from([(a, vec![b]), (b, vec![c]), (c, vec![a])]);
        assert_eq!(find_cycle(&graph), Some(vec![a, b, c, a]));
    }

    #[test]
    fn find_cycle_accepts_dags() {
        let a = ModuleId::from_raw(1);
        let b = ModuleId::from_raw(2);
        let c = ModuleId::from_raw(3);
        let graph = BTreeMap::from([(a, vec![b, c]), (b, vec![c]), (c, vec![])]);
        assert_eq!(find_cycle(&graph), None);

        let self_loop = BTreeMap::from([(a, vec![a])]);
        assert_eq!(find_cycle(&self_loop), Some(vec![a, a]));
    }
}
