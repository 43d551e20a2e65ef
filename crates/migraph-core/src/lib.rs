//! migraph core - Dependency graph, migration planner, and schema-state model.
//!
//! Schedules schema migrations across independently versioned modules that
//! may depend on each other, and reconstructs the schema state at any point
//! in that history.

pub mod action;
pub mod error;
pub mod executor;
pub mod graph;
pub mod history;
pub mod loader;
pub mod migration;
pub mod migrator;
pub mod planner;
pub mod state;

pub use action::Action;
pub use error::{Error, GraphError, LoadError, Result, StateError};
pub use executor::{
    BackendError, ExecutionResult, Executor, ExecutorConfig, NoopHooks, ProgressHooks,
    SchemaBackend, SchemaChange, TracingHooks,
};
pub use graph::{DependencyGraph, Edges};
pub use history::{ActionState, StateHistory};
pub use loader::{Discovery, Loader};
pub use migration::{Migration, MigrationId, ROOT_MIGRATION_NAME};
pub use migrator::Migrator;
pub use planner::{
    AppliedSet, Direction, Plan, PlanStep, Planner, PlannerConfig, DEFAULT_MAX_PLAN_NODES,
};

// State model exports
pub use state::{
    DefaultValue, EntityKey, EntityState, FieldDef, FieldType, ScalarType, SchemaState,
};
