//! warden-core
//!
//! Policy identity and dependency resolution for the warden authorization engine:
//! - policy document models (v1)
//! - kind classification and fully-qualified names
//! - stable module ids and content hashes
//! - dependency and schema reference extraction
//! - compilation unit assembly
//!
//! This crate performs no network or filesystem I/O. Store backends hand it
//! decoded policies; the compiler receives sealed compilation units.

pub mod config;
pub mod deps;
pub mod determinism;
pub mod errors;
pub mod kind;
pub mod metadata;
pub mod model;
pub mod namer;
pub mod parse;
pub mod registry;
pub mod resolve;
pub mod unit;
pub mod version;
pub mod wrapper;

pub use crate::errors::{PolicyError, PolicyResult};

/// Current policy document api version.
pub const API_VERSION_V1: &str = "api.warden.dev/v1";

/// FQN prefixes and hashing domain labels.
/// These must remain stable across versions.
pub mod domain {
    pub const RESOURCE_PREFIX: &str = "resource";
    pub const PRINCIPAL_PREFIX: &str = "principal";
    pub const DERIVED_ROLES_PREFIX: &str = "derived_roles";
    pub const POLICY_CONTENT: &str = "warden.v1.policy";
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::config::{CoreConfig, LimitsConfig};
    pub use crate::deps::{dependencies_of, schema_references_of};
    pub use crate::kind::{kind_of, Kind};
    pub use crate::metadata::{
        content_hash, hash_of, source_file_of, with_hash, with_metadata, with_store_identifier,
    };
    pub use crate::model::v1::{DerivedRoles, Metadata, Policy, PolicyType, PrincipalPolicy, ResourcePolicy};
    pub use crate::namer::{fqn_of, module_id_of, ModuleId};
    pub use crate::registry::{Ingested, PolicyRegistry};
    pub use crate::resolve::{DefinitionSource, UnitResolver};
    pub use crate::unit::{CompilationUnit, CompleteUnit};
    pub use crate::wrapper::Wrapper;
    pub use crate::{PolicyError, PolicyResult};
}
