//! Plan executor.
//!
//! Walks a plan step by step, hands every action to a [`SchemaBackend`]
//! together with the schema states around it, and reports progress through
//! [`ProgressHooks`].

use crate::action::Action;
use crate::error::{Error, Result};
use crate::history::{ActionState, StateHistory};
use crate::migration::MigrationId;
use crate::planner::{AppliedSet, Direction, Plan, PlanStep, Planner};
use crate::state::SchemaState;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Error type a backend may return.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Executor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Walk the plan and fire hooks without calling the backend or
    /// touching the applied set.
    pub dry_run: bool,
}

impl ExecutorConfig {
    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// One schema alteration handed to the backend.
///
/// `from_state` and `to_state` are always the states before and after the
/// action in forward history. A backwards change moves the datastore from
/// `to_state` back to `from_state`.
#[derive(Debug, Clone, Copy)]
pub struct SchemaChange<'a> {
    /// Whether the action is being applied or unapplied.
    pub direction: Direction,
    /// The migration the action belongs to.
    pub migration: &'a MigrationId,
    /// The action.
    pub action: &'a Action,
    /// State before the action in forward history.
    pub from_state: &'a SchemaState,
    /// State after the action in forward history.
    pub to_state: &'a SchemaState,
}

/// Turns schema changes into real datastore alterations.
pub trait SchemaBackend {
    /// Apply one change.
    fn alter_schema(&mut self, change: &SchemaChange<'_>) -> Result<(), BackendError>;
}

/// Observational callbacks fired while a plan runs.
///
/// Every method defaults to doing nothing.
pub trait ProgressHooks {
    /// A migration is about to run.
    fn migration_start(&mut self, _step: &PlanStep) {}

    /// An action is about to run.
    fn action_start(&mut self, _step: &PlanStep, _action: &Action) {}

    /// An action finished.
    fn action_end(&mut self, _step: &PlanStep, _action: &Action) {}

    /// A migration finished.
    fn migration_end(&mut self, _step: &PlanStep) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ProgressHooks for NoopHooks {}

/// Hooks that report progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

impl ProgressHooks for TracingHooks {
    fn migration_start(&mut self, step: &PlanStep) {
        info!(
            migration = %step.id(),
            direction = %step.direction,
            actions = step.migration.actions.len(),
            "running migration"
        );
    }

    fn action_start(&mut self, step: &PlanStep, action: &Action) {
        debug!(migration = %step.id(), direction = %step.direction, %action, "running action");
    }

    fn action_end(&mut self, step: &PlanStep, action: &Action) {
        debug!(migration = %step.id(), %action, "action done");
    }

    fn migration_end(&mut self, step: &PlanStep) {
        info!(migration = %step.id(), direction = %step.direction, "migration done");
    }
}

/// Outcome of executing a plan.
///
/// A dry run executes nothing, so both counters stay at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Migrations applied or unapplied.
    pub migrations_executed: usize,
    /// Actions the backend completed.
    pub actions_executed: usize,
    /// Steps in the plan.
    pub total_steps: usize,
}

/// Executes plans against a backend.
#[derive(Debug, Clone)]
pub struct Executor<'g> {
    history: StateHistory<'g>,
    config: ExecutorConfig,
}

impl<'g> Executor<'g> {
    /// Create an executor with the default configuration.
    pub fn new(planner: Planner<'g>) -> Self {
        Self::with_config(planner, ExecutorConfig::default())
    }

    /// Create an executor with an explicit configuration.
    pub fn with_config(planner: Planner<'g>, config: ExecutorConfig) -> Self {
        Self {
            history: StateHistory::new(planner),
            config,
        }
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run every step of `plan` in order.
    ///
    /// `applied` is updated after each completed migration, so if the
    /// backend fails midway it still reflects what the datastore holds.
    #[instrument(skip_all, fields(steps = plan.len(), dry_run = self.config.dry_run))]
    pub fn execute<B, H>(
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
        let mut result = ExecutionResult {
            total_steps: plan.len(),
            ..Default::default()
        };

        let mut captured = self.history.plan_action_states(plan)?;

        for step in plan {
            hooks.migration_start(step);

            let mut states = captured.remove(step.id()).unwrap_or_default();
            if step.direction == Direction::Backwards {
                states.reverse();
            }
            for state in &states {
                hooks.action_start(step, &state.action);
                if !self.config.dry_run {
                    self.alter(&mut *backend, step, state)?;
                    result.actions_executed += 1;
                }
                hooks.action_end(step, &state.action);
            }

            if !self.config.dry_run {
                match step.direction {
                    Direction::Forwards => applied.insert(step.id().clone()),
                    Direction::Backwards => applied.remove(step.id()),
                };
                result.migrations_executed += 1;
            }
            hooks.migration_end(step);
        }

        info!(
            migrations = result.migrations_executed,
            actions = result.actions_executed,
            "plan executed"
        );
        Ok(result)
    }

    fn alter<B>(&self, backend: &mut B, step: &PlanStep, state: &ActionState) -> Result<()>
    where
        B: SchemaBackend + ?Sized,
    {
        let change = SchemaChange {
            direction: step.direction,
            migration: step.id(),
            action: &state.action,
            from_state: &state.from_state,
            to_state: &state.to_state,
        };
        backend
            .alter_schema(&change)
            .map_err(|source| Error::Backend {
                migration: step.id().clone(),
                action: state.action.to_string(),
                source,
            })
    }
}
