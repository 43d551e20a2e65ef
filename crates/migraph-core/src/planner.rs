//! Migration planning.
//!
//! Turns a list of targets plus the set of already-applied migrations into a
//! single linear plan of forward and backward steps.

use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, Edges};
use crate::migration::{Migration, MigrationId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Default ceiling on the number of migrations one traversal may visit.
pub const DEFAULT_MAX_PLAN_NODES: usize = 100_000;

/// Migrations recorded as applied by the target datastore.
pub type AppliedSet = BTreeSet<MigrationId>;

/// Planner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum number of migrations a single traversal may visit.
    /// None means unbounded.
    pub max_nodes: Option<usize>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_nodes: Some(DEFAULT_MAX_PLAN_NODES),
        }
    }
}

impl PlannerConfig {
    /// A configuration without a node ceiling.
    pub fn unbounded() -> Self {
        Self { max_nodes: None }
    }

    /// Set the node ceiling.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }
}

/// Direction of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Apply the migration.
    Forwards,
    /// Unapply the migration.
    Backwards,
}

impl Direction {
    /// Check if this is the apply direction.
    pub fn is_forwards(self) -> bool {
        self == Direction::Forwards
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forwards => write!(f, "forwards"),
            Direction::Backwards => write!(f, "backwards"),
        }
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// Whether to apply or unapply.
    pub direction: Direction,
    /// The migration to run.
    pub migration: Arc<Migration>,
}

impl PlanStep {
    /// Identity of the step's migration.
    pub fn id(&self) -> &MigrationId {
        &self.migration.id
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            Direction::Forwards => "+",
            Direction::Backwards => "-",
        };
        write!(f, "{} {}", arrow, self.migration.id)
    }
}

/// An ordered list of steps. No migration appears twice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// The steps in execution order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Iterate steps in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, PlanStep> {
        self.steps.iter()
    }

    /// `(direction, id)` pairs in execution order.
    pub fn entries(&self) -> Vec<(Direction, MigrationId)> {
        self.steps
            .iter()
            .map(|s| (s.direction, s.id().clone()))
            .collect()
    }

    /// Steps that apply migrations.
    pub fn forwards(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.direction.is_forwards())
    }

    /// Steps that unapply migrations.
    pub fn backwards(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| !s.direction.is_forwards())
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render the plan as a JSON array of `{direction, module, name}` objects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.steps
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "direction": s.direction,
                        "module": s.migration.id.module,
                        "name": s.migration.id.name,
                    })
                })
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlanStep;
    type IntoIter = std::slice::Iter<'a, PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Computes plans over a dependency graph.
///
/// The planner only reads the graph; plans it returns are independent values.
#[derive(Debug, Clone)]
pub struct Planner<'g> {
    graph: &'g DependencyGraph,
    config: PlannerConfig,
}

impl<'g> Planner<'g> {
    /// Create a planner with the default configuration.
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self::with_config(graph, PlannerConfig::default())
    }

    /// Create a planner with an explicit configuration.
    pub fn with_config(graph: &'g DependencyGraph, config: PlannerConfig) -> Self {
        Self { graph, config }
    }

    /// The graph being planned over.
    pub fn graph(&self) -> &'g DependencyGraph {
        self.graph
    }

    /// The planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan the steps that bring each target module to its target migration.
    ///
    /// Targets are handled in order. A target that is not applied yet is
    /// migrated forwards together with every missing prerequisite. A target
    /// that is applied has every later migration of its module unapplied,
    /// along with everything depending on those. Root migrations always
    /// count as applied.
    #[instrument(skip_all, fields(targets = targets.len(), applied = applied.len()))]
    pub fn plan(&self, targets: &[MigrationId], applied: &AppliedSet) -> Result<Plan> {
        let mut applied = self.effective_applied(applied);
        let mut planned: HashSet<MigrationId> = HashSet::new();
        let mut plan = Plan::default();

        for target in targets {
            self.graph.get(target)?;

            if !applied.contains(target) {
                for id in self
                    .graph
                    .resolve(target, Edges::Prerequisites, self.config.max_nodes)?
                {
                    if applied.insert(id.clone()) {
                        self.push(&mut plan, &mut planned, Direction::Forwards, id)?;
                    }
                }
                continue;
            }

            let Some(boundary) = self.undo_boundary(target)? else {
                debug!(%target, "target is already the module tip");
                continue;
            };
            for id in self
                .graph
                .resolve(&boundary, Edges::Dependents, self.config.max_nodes)?
            {
                if applied.remove(&id) {
                    self.push(&mut plan, &mut planned, Direction::Backwards, id)?;
                }
            }
        }

        debug!(steps = plan.len(), "plan computed");
        Ok(plan)
    }

    fn effective_applied(&self, applied: &AppliedSet) -> HashSet<MigrationId> {
        let mut effective: HashSet<MigrationId> = HashSet::with_capacity(applied.len());
        for id in applied {
            if self.graph.contains(id) {
                effective.insert(id.clone());
            } else {
                warn!(migration = %id, "ignoring applied migration unknown to the graph");
            }
        }
        effective.extend(self.graph.roots().cloned());
        effective
    }

    /// The migration directly after `target` in its own module, if any.
    fn undo_boundary(&self, target: &MigrationId) -> Result<Option<MigrationId>> {
        let mut same_module = self
            .graph
            .dependents_of(target)?
            .iter()
            .filter(|d| d.same_module(target));

        let boundary = same_module.next().cloned();
        if let Some(extra) = same_module.next() {
            return Err(Error::invariant(format!(
                "{} has more than one successor in its module ({} and {})",
                target,
                boundary.as_ref().map(|b| b.to_string()).unwrap_or_default(),
                extra
            )));
        }
        Ok(boundary)
    }

    fn push(
        &self,
        plan: &mut Plan,
        planned: &mut HashSet<MigrationId>,
        direction: Direction,
        id: MigrationId,
    ) -> Result<()> {
        if !planned.insert(id.clone()) {
            return Err(Error::ConflictingTargets { migration: id });
        }
        let migration = Arc::clone(self.graph.get(&id)?);
        plan.steps.push(PlanStep {
            direction,
            migration,
        });
        Ok(())
    }
}
