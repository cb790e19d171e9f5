//! Error types for warden-core.
//!
//! Every error is local to the policy or compilation unit being processed.
//! Nothing in this crate aborts the process on bad input; a forward-incompatible
//! or malformed definition is reported to the caller as a `PolicyError`.
//!
//! Each variant exposes a stable dotted code via [`PolicyError::code`] so that
//! API and CLI layers can match on errors without parsing messages.

use thiserror::Error;

use crate::namer::ModuleId;

/// Result alias used across the crate.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Main error type for policy identity and resolution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// The policy variant is unset or not recognized by this engine.
    #[error("unsupported policy kind: {detail}")]
    UnsupportedKind { detail: String },

    /// Two distinct FQNs derived the same module id.
    #[error("module id {id} is claimed by `{existing}` and `{incoming}`")]
    ModuleIdentityCollision {
        id: ModuleId,
        existing: String,
        incoming: String,
    },

    /// The same module was supplied twice with different content.
    #[error("conflicting definitions for `{fqn}` (module id {id}): content hash {existing_hash:016x} != {incoming_hash:016x}")]
    DefinitionConflict {
        id: ModuleId,
        fqn: String,
        existing_hash: u64,
        incoming_hash: u64,
    },

    /// A dependency referenced by the unit has no definition.
    #[error("compilation unit `{unit}` is missing dependency `{fqn}` (module id {missing})")]
    IncompleteCompilationUnit {
        unit: String,
        missing: ModuleId,
        fqn: String,
    },

    /// The dependency graph of a unit contains a cycle.
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A definition source failed while loading a module.
    #[error("failed to load `{fqn}` from definition source")]
    SourceFailed {
        fqn: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl PolicyError {
    pub fn unsupported_kind(detail: impl Into<String>) -> Self {
        Self::UnsupportedKind {
            detail: detail.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedKind { .. } => "policy.unsupported_kind",
            Self::ModuleIdentityCollision { .. } => "policy.module_identity_collision",
            Self::DefinitionConflict { .. } => "policy.definition_conflict",
            Self::IncompleteCompilationUnit { .. } => "unit.incomplete",
            Self::CyclicDependency { .. } => "unit.cyclic_dependency",
            Self::SourceFailed { .. } => "source.failed",
            Self::InvalidArgument(_) => "core.invalid_argument",
            Self::Serialization(_) => "core.serialization",
            Self::Invariant(_) => "core.invariant",
        }
    }
}
