//! Error types for graph construction, planning, and state replay.

use crate::migration::MigrationId;
use crate::state::EntityKey;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while building or traversing the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node was looked up that was never registered.
    #[error("unknown migration: {migration}")]
    UnknownMigration {
        /// The unregistered migration.
        migration: MigrationId,
    },

    /// A dependency edge points at a migration that was never registered.
    #[error("{migration} depends on {dependency}, which does not exist")]
    UnknownDependency {
        /// The migration declaring the dependency.
        migration: MigrationId,
        /// The missing prerequisite.
        dependency: MigrationId,
    },

    /// A declared dependency points into the migration's own module.
    #[error("{migration} declares a dependency on {dependency} in its own module")]
    SelfDependency {
        /// The migration declaring the dependency.
        migration: MigrationId,
        /// The same-module prerequisite.
        dependency: MigrationId,
    },

    /// The traversal found a node on its own active path.
    #[error("circular dependency: {}", format_cycle(.cycle))]
    CircularDependency {
        /// The cycle in visitation order, starting and ending with the repeated node.
        cycle: Vec<MigrationId>,
    },

    /// The traversal visited more nodes than the configured ceiling.
    #[error("plan exceeds the limit of {limit} migrations")]
    PlanTooLarge {
        /// The configured node ceiling.
        limit: usize,
    },
}

fn format_cycle(cycle: &[MigrationId]) -> String {
    cycle
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised while applying an action to a schema state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The action targets an entity that does not exist.
    #[error("{action}: unknown entity {entity}")]
    UnknownEntity {
        /// Description of the offending action.
        action: String,
        /// The missing entity.
        entity: EntityKey,
    },

    /// The action targets a field that does not exist.
    #[error("{action}: unknown field {field} on {entity}")]
    UnknownField {
        /// Description of the offending action.
        action: String,
        /// The entity that was searched.
        entity: EntityKey,
        /// The missing field name.
        field: String,
    },

    /// The action creates an entity that already exists.
    #[error("{action}: entity {entity} already exists")]
    DuplicateEntity {
        /// Description of the offending action.
        action: String,
        /// The existing entity.
        entity: EntityKey,
    },

    /// The action creates a field that already exists.
    #[error("{action}: field {field} already exists on {entity}")]
    DuplicateField {
        /// Description of the offending action.
        action: String,
        /// The entity holding the field.
        entity: EntityKey,
        /// The duplicated field name.
        field: String,
    },
}

/// Errors raised while loading migrations into a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Two modules were supplied under the same label.
    #[error("module {module} was supplied twice")]
    DuplicateModule {
        /// The duplicated label.
        module: String,
    },

    /// A discovered migration uses the reserved root name.
    #[error("{migration} uses the reserved root migration name")]
    ReservedName {
        /// The offending migration.
        migration: MigrationId,
    },

    /// No migrations are known for the module.
    #[error("module {module} has no migrations")]
    UnmigratedModule {
        /// The unknown module label.
        module: String,
    },

    /// No migration with that name (or prefix) exists in the module.
    #[error("no migration {name} in module {module}")]
    NonexistentMigration {
        /// The module searched.
        module: String,
        /// The requested name or prefix.
        name: String,
    },

    /// A prefix matches more than one migration.
    #[error("prefix {prefix} is ambiguous in module {module}: {}", .candidates.join(", "))]
    AmbiguousMigration {
        /// The module searched.
        module: String,
        /// The requested prefix.
        prefix: String,
        /// Every name matching the prefix.
        candidates: Vec<String>,
    },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Graph construction or traversal error.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Schema state mutation error.
    #[error(transparent)]
    State(#[from] StateError),

    /// Migration loading or lookup error.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// An internal consistency check failed.
    #[error("invariant violated: {message}")]
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },

    /// The requested targets would both apply and unapply one migration.
    #[error("targets conflict: {migration} would appear twice in the plan")]
    ConflictingTargets {
        /// The migration planned twice.
        migration: MigrationId,
    },

    /// The schema backend rejected an action.
    #[error("backend failed on {migration} ({action}): {source}")]
    Backend {
        /// The migration being executed.
        migration: MigrationId,
        /// Description of the action being executed.
        action: String,
        /// The backend's error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Build an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::InvariantViolation {
            message: message.into(),
        }
    }
}
