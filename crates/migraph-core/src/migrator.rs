//! Entry point tying the loader, planner and executor together.

use crate::error::{Error, Result};
use crate::executor::{ExecutionResult, Executor, ExecutorConfig, ProgressHooks, SchemaBackend};
use crate::history::StateHistory;
use crate::loader::Loader;
use crate::migration::{MigrationId, ROOT_MIGRATION_NAME};
use crate::planner::{AppliedSet, Plan, Planner, PlannerConfig};
use crate::state::SchemaState;
use tracing::debug;

/// Plans and executes migrations for a loaded set of modules.
#[derive(Debug, Clone)]
pub struct Migrator<'l> {
    loader: &'l Loader,
    planner_config: PlannerConfig,
    executor_config: ExecutorConfig,
}

impl<'l> Migrator<'l> {
    /// Create a migrator with default configuration.
    pub fn new(loader: &'l Loader) -> Self {
        Self {
            loader,
            planner_config: PlannerConfig::default(),
            executor_config: ExecutorConfig::default(),
        }
    }

    /// Set the planner configuration.
    pub fn with_planner_config(mut self, config: PlannerConfig) -> Self {
        self.planner_config = config;
        self
    }

    /// Set the executor configuration.
    pub fn with_executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor_config = config;
        self
    }

    /// The loaded migrations.
    pub fn loader(&self) -> &'l Loader {
        self.loader
    }

    /// A planner over the loaded graph.
    pub fn planner(&self) -> Planner<'l> {
        Planner::with_config(self.loader.graph(), self.planner_config.clone())
    }

    /// Work out which migrations the caller wants to reach.
    ///
    /// - no module: the top of every module
    /// - module only: the top of that module
    /// - module and target: the migration named by the target, which may be
    ///   the root name or a unique prefix
    pub fn targets(&self, module: Option<&str>, target: Option<&str>) -> Result<Vec<MigrationId>> {
        match (module, target) {
            (None, None) => self
                .loader
                .modules()
                .map(|module| Ok(self.loader.get_top_migration(module)?.id.clone()))
                .collect(),
            (Some(module), None) => Ok(vec![self.loader.get_top_migration(module)?.id.clone()]),
            (Some(module), Some(ROOT_MIGRATION_NAME)) => {
                Ok(vec![self.loader.get_migration(module, ROOT_MIGRATION_NAME)?.id.clone()])
            }
            (Some(module), Some(target)) => Ok(vec![self
                .loader
                .get_migration_by_prefix(module, target)?
                .id
                .clone()]),
            (None, Some(target)) => Err(Error::invariant(format!(
                "target {} was given without a module",
                target
            ))),
        }
    }

    /// Plan the steps needed to reach the selected targets.
    pub fn calculate_plan(
        &self,
        module: Option<&str>,
        target: Option<&str>,
        applied: &AppliedSet,
    ) -> Result<Plan> {
        let targets = self.targets(module, target)?;
        debug!(targets = targets.len(), "targets selected");
        self.planner().plan(&targets, applied)
    }

    /// Execute a plan, updating `applied` as migrations complete.
    pub fn execute_plan<B, H>(
        &self,
        plan: &Plan,
        backend: &mut B,
        hooks: &mut H,
        applied: &mut AppliedSet,
    ) -> Result<ExecutionResult>
    where
        B: SchemaBackend + ?Sized,
        H: ProgressHooks + ?Sized,
    {
        Executor::with_config(self.planner(), self.executor_config.clone())
            .execute(plan, backend, hooks, applied)
    }

    /// The schema state once `module:name` and its history are applied.
    pub fn state_for(&self, module: &str, name: &str) -> Result<SchemaState> {
        let migration = self.loader.get_migration(module, name)?;
        StateHistory::new(self.planner()).state_for(&migration.id)
    }
}
