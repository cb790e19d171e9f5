//! Breadth-first assembly of compilation units.
//!
//! Where definitions come from (cache, store, network) is the caller's
//! business, expressed as a [`DefinitionSource`]. The resolver walks the
//! dependency graph from a main policy, loads each module once, checks that
//! the source returned the module it was asked for, and seals the result.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, warn};

use crate::config::LimitsConfig;
use crate::errors::{PolicyError, PolicyResult};
use crate::model::v1::Policy;
use crate::namer::ModuleId;
use crate::unit::{CompilationUnit, CompleteUnit};
use crate::wrapper::Wrapper;

/// Something that can supply definitions by module id.
pub trait DefinitionSource {
    /// Load the definition for `id`. `fqn` is the name the id was derived
    /// from. `Ok(None)` means the source does not have it.
    fn load(&self, id: ModuleId, fqn: &str) -> anyhow::Result<Option<Policy>>;
}

impl DefinitionSource for BTreeMap<ModuleId, Policy> {
    fn load(&self, id: ModuleId, _fqn: &str) -> anyhow::Result<Option<Policy>> {
        Ok(self.get(&id).cloned())
    }
}

/// Assembles sealed compilation units from a definition source.
pub struct UnitResolver<'s, S: DefinitionSource + ?Sized> {
    source: &'s S,
    limits: LimitsConfig,
}

impl<'s, S: DefinitionSource + ?Sized> UnitResolver<'s, S> {
    pub fn new(source: &'s S, limits: LimitsConfig) -> Self {
        Self { source, limits }
    }

    /// Build the unit for `main` and every definition it transitively imports.
    pub fn resolve(&self, main: Policy) -> PolicyResult<CompleteUnit> {
        let (main_id, main_fqn, mut queue) = {
            let w = Wrapper::wrap(&main)?;
            self.check_imports(&w)?;
            let pending: VecDeque<(ModuleId, String)> =
                w.dependencies.iter().copied().zip(w.dependency_fqns()).collect();
            (w.id, w.fqn.clone(), pending)
        };

        let mut unit = CompilationUnit::new(main_id);
        unit.add_definition(main_id, main)?;
        let mut visited = BTreeMap::from([(main_id, main_fqn)]);

        while let Some((id, fqn)) = queue.pop_front() {
            if !claim(&mut visited, id, &fqn)? {
                continue;
            }

            if unit.len() >= self.limits.max_unit_definitions {
                return Err(PolicyError::invalid_argument(format!(
                    "compilation unit `{}` exceeds max_unit_definitions ({})",
                    unit.key(),
                    self.limits.max_unit_definitions
                )));
            }

            let policy = self
                .source
                .load(id, &fqn)
                .map_err(|source| PolicyError::SourceFailed {
                    fqn: fqn.clone(),
                    source: source.into(),
                })?;

            let Some(policy) = policy else {
                warn!(unit = %unit.key(), module_id = %id, fqn = %fqn, "dependency not found");
                return Err(PolicyError::IncompleteCompilationUnit {
                    unit: unit.key(),
                    missing: id,
                    fqn,
                });
            };

            {
                let w = Wrapper::wrap(&policy)?;
                if w.fqn != fqn {
                    if w.id == id {
                        return Err(PolicyError::ModuleIdentityCollision {
                            id,
                            existing: fqn,
                            incoming: w.fqn,
                        });
                    }
                    return Err(PolicyError::invalid_argument(format!(
                        "definition source returned `{}` when asked for `{fqn}`",
                        w.fqn
                    )));
                }
                self.check_imports(&w)?;
                queue.extend(w.dependencies.iter().copied().zip(w.dependency_fqns()));
            }

            debug!(module_id = %id, fqn = %fqn, "resolved dependency");
            unit.add_definition(id, policy)?;
        }

        unit.seal()
    }

    fn check_imports(&self, w: &Wrapper<'_>) -> PolicyResult<()> {
        if w.dependencies.len() > self.limits.max_imports {
            return Err(PolicyError::invalid_argument(format!(
                "`{}` imports {} modules (limit {})",
                w.fqn,
                w.dependencies.len(),
                self.limits.max_imports
            )));
        }
        Ok(())
    }
}

/// Record `fqn` as visited under `id`. Returns `false` when it already was,
/// and fails when the id was first reached through a different FQN.
fn claim(visited: &mut BTreeMap<ModuleId, String>, id: ModuleId, fqn: &str) -> PolicyResult<bool> {
    match visited.get(&id) {
        None => {
            visited.insert(id, fqn.to_string());
            Ok(true)
        }
        Some(seen) if seen == fqn => Ok(false),
        Some(seen) => {
            warn!(module_id = %id, existing = %seen, incoming = %fqn, "module id collision");
            Err(PolicyError::ModuleIdentityCollision {
                id,
                existing: seen.clone(),
                incoming: fqn.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::v1::{DerivedRoles, ResourcePolicy};
    use crate::namer::module_id_of;
    use assert_matches::assert_matches;
    use std::cell::Cell;

    fn resource(imports: &[&str]) -> Policy {
        Policy::resource(ResourcePolicy {
            resource: "leave_request".into(),
            version: "default".into(),
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

    fn store(names: &[&str]) -> BTreeMap<ModuleId, Policy> {
        names
            .iter()
            .map(|n| (module_id_of(&format!("derived_roles.{n}")), derived(n)))
            .collect()
    }

    struct CountingSource {
        inner: BTreeMap<ModuleId, Policy>,
        loads: Cell<usize>,
    }

    impl DefinitionSource for CountingSource {
        fn load(&self, id: ModuleId, fqn: &str) -> anyhow::Result<Option<Policy>> {
            self.loads.set(self.loads.get() + 1);
            self.inner.load(id, fqn)
        }
    }

    struct FailingSource;

    impl DefinitionSource for FailingSource {
        fn load(&self, _id: ModuleId, _fqn: &str) -> anyhow::Result<Option<Policy>> {
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn resolves_imports() {
        let src = store(&["common_roles", "beta", "unused"]);
        let unit = UnitResolver::new(&src, LimitsConfig::default())
            .resolve(resource(&["common_roles", "beta"]))
            .unwrap();
        assert_eq!(unit.len(), 3);
        assert_eq!(unit.mod_id(), module_id_of("resource.leave_request/default"));
        assert!(!unit.contains(module_id_of("derived_roles.unused")));
    }

    #[test]
    fn duplicate_imports_load_once() {
        let src = CountingSource {
            inner: store(&["common_roles"]),
            loads: Cell::new(0),
        };
        let unit = UnitResolver::new(&src, LimitsConfig::default())
            .resolve(resource(&["common_roles", "common_roles"]))
            .unwrap();
        assert_eq!(unit.len(), 2);
        assert_eq!(src.loads.get(), 1);
    }

    #[test]
    fn missing_import_fails() {
        let src = store(&["common_roles"]);
        let err = UnitResolver::new(&src, LimitsConfig::default())
            .resolve(resource(&["common_roles", "absent"]))
            .unwrap_err();
        match err {
            PolicyError::IncompleteCompilationUnit { missing, fqn, .. } => {
                assert_eq!(fqn, "derived_roles.absent");
                assert_eq!(missing, module_id_of("derived_roles.absent"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn wrong_definition_from_source_rejected() {
        let mut src = BTreeMap::new();
        src.insert(module_id_of("derived_roles.common_roles"), derived("other"));
        let err = UnitResolver::new(&src, LimitsConfig::default())
            .resolve(resource(&["common_roles"]))
            .unwrap_err();
        assert_matches!(err, PolicyError::InvalidArgument(_));
    }

    #[test]
    fn source_failure_is_wrapped() {
        let err = UnitResolver::new(&FailingSource, LimitsConfig::default())
            .resolve(resource(&["common_roles"]))
            .unwrap_err();
        assert_eq!(err.code(), "source.failed");
    }

    #[test]
    fn visited_ids_remember_their_fqn() {
        let id = module_id_of("resource.leave_request/default");
        let mut visited = BTreeMap::new();
        assert!(claim(&mut visited, id, "resource.leave_request/default").unwrap());
        assert!(!claim(&mut visited, id, "resource.leave_request/default").unwrap());

        // Same id reached through another name.
        let err = claim(&mut visited, id, "derived_roles.common_roles").unwrap_err();
        match err {
            PolicyError::ModuleIdentityCollision {
                existing, incoming, ..
            } => {
                assert_eq!(existing, "resource.leave_request/default");
                assert_eq!(incoming, "derived_roles.common_roles");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn limits_enforced() {
        let src = store(&["a", "b", "c"]);
        let limits = LimitsConfig {
            max_unit_definitions: 2,
            max_imports: 1,
            ..LimitsConfig::default()
        };
        let err = UnitResolver::new(&src, limits.clone())
            .resolve(resource(&["a", "b"]))
            .unwrap_err();
        assert!(err.to_string().contains("limit 1"));

        let limits = LimitsConfig {
            max_imports: 8,
            ..limits
        };
        let err = UnitResolver::new(&src, limits)
            .resolve(resource(&["a", "b", "c"]))
            .unwrap_err();
        assert!(err.to_string().contains("max_unit_definitions"));
    }
}
