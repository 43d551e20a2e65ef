//! Schema-state reconstruction.
//!
//! Replays the full forward history of a migration, from nothing applied,
//! into a fresh [`SchemaState`].

use crate::action::Action;
use crate::error::{Error, Result};
use crate::graph::Edges;
use crate::migration::{Migration, MigrationId};
use crate::planner::{AppliedSet, Direction, Plan, Planner};
use crate::state::SchemaState;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Schema state immediately before and after one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionState {
    /// The action.
    pub action: Action,
    /// State before the action ran.
    pub from_state: SchemaState,
    /// State after the action ran.
    pub to_state: SchemaState,
}

/// Rebuilds schema states from migration history.
#[derive(Debug, Clone)]
pub struct StateHistory<'g> {
    planner: Planner<'g>,
}

impl<'g> StateHistory<'g> {
    /// Create a history over the planner's graph.
    pub fn new(planner: Planner<'g>) -> Self {
        Self { planner }
    }

    /// The schema state once `migration` and everything it needs are applied.
    pub fn state_for(&self, migration: &MigrationId) -> Result<SchemaState> {
        let plan = self.full_history(migration)?;
        let mut state = SchemaState::new();
        for step in &plan {
            for action in &step.migration.actions {
                action.apply_to(&mut state)?;
            }
        }
        Ok(state)
    }

    /// Before/after snapshots for every action of `migration`.
    ///
    /// The first snapshot is the state with every prerequisite applied and
    /// `migration` itself not yet applied.
    pub fn action_states(&self, migration: &MigrationId) -> Result<Vec<ActionState>> {
        let plan = self.full_history(migration)?;
        let mut state = SchemaState::new();
        let mut states = Vec::new();

        for step in &plan {
            if step.id() != migration {
                for action in &step.migration.actions {
                    action.apply_to(&mut state)?;
                }
                continue;
            }
            for action in &step.migration.actions {
                let from_state = state.snapshot();
                action.apply_to(&mut state)?;
                trace!(%migration, %action, "captured action state");
                states.push(ActionState {
                    action: action.clone(),
                    from_state,
                    to_state: state.snapshot(),
                });
            }
        }
        Ok(states)
    }

    /// Before/after snapshots for the actions of every migration in `plan`,
    /// from a single replay.
    ///
    /// The replay applies each step's migration after its prerequisites, in
    /// plan order, so a snapshot may also hold entities from migrations an
    /// earlier step needed.
    pub fn plan_action_states(
        &self,
        plan: &Plan,
    ) -> Result<HashMap<MigrationId, Vec<ActionState>>> {
        let targets: Vec<MigrationId> = plan.iter().map(|s| s.id().clone()).collect();
        let wanted: HashSet<&MigrationId> = targets.iter().collect();
        let mut state = SchemaState::new();
        let mut captured = HashMap::with_capacity(targets.len());

        let history = self.forward_history(&targets)?;
        for migration in &history {
            if !wanted.contains(&migration.id) {
                for action in &migration.actions {
                    action.apply_to(&mut state)?;
                }
                continue;
            }
            let mut states = Vec::with_capacity(migration.actions.len());
            for action in &migration.actions {
                let from_state = state.snapshot();
                action.apply_to(&mut state)?;
                states.push(ActionState {
                    action: action.clone(),
                    from_state,
                    to_state: state.snapshot(),
                });
            }
            captured.insert(migration.id.clone(), states);
        }

        debug!(replayed = history.len(), captured = captured.len(), "plan states captured");
        Ok(captured)
    }

    /// Every target and its prerequisites, each once, prerequisites first.
    fn forward_history(&self, targets: &[MigrationId]) -> Result<Vec<Arc<Migration>>> {
        let graph = self.planner.graph();
        let limit = self.planner.config().max_nodes;
        let mut seen: HashSet<MigrationId> = HashSet::new();
        let mut history = Vec::new();

        for target in targets {
            if seen.contains(target) {
                continue;
            }
            for id in graph.resolve(target, Edges::Prerequisites, limit)? {
                if seen.insert(id.clone()) {
                    history.push(Arc::clone(graph.get(&id)?));
                }
            }
        }
        Ok(history)
    }

    /// Plan `migration` from nothing applied and check it is forwards-only.
    fn full_history(&self, migration: &MigrationId) -> Result<Plan> {
        let plan = self.planner.plan(&[migration.clone()], &AppliedSet::new())?;
        if let Some(step) = plan.iter().find(|s| s.direction == Direction::Backwards) {
            return Err(Error::invariant(format!(
                "history of {} contains a backwards step for {}",
                migration,
                step.id()
            )));
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use crate::graph::DependencyGraph;
    use crate::migration::Migration;
    use crate::state::{EntityKey, FieldDef, FieldType, ScalarType};

    fn id(module: &str, name: &str) -> MigrationId {
        MigrationId::new(module, name)
    }

    fn author_graph(extra: Vec<Action>) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        graph.add(Migration::root("app1"));
        graph.add(Migration::new("app1", "0001_initial").with_action(Action::create_entity(
            "app1",
            "Author",
            vec![FieldDef::new("name", FieldType::scalar(ScalarType::varchar(255)))],
        )));
        graph.add(Migration::new("app1", "0002_yob").with_actions(extra));
        graph
            .link_chain(&[
                MigrationId::root("app1"),
                id("app1", "0001_initial"),
                id("app1", "0002_yob"),
            ])
            .unwrap();
        graph
    }

    fn yob() -> Action {
        Action::create_field(
            "app1",
            "Author",
            FieldDef::optional("yob", FieldType::optional_scalar(ScalarType::Int32)),
        )
    }

    #[test]
    fn test_first_state_is_empty() {
        let graph = author_graph(vec![yob()]);
        let history = StateHistory::new(Planner::new(&graph));
        let states = history.action_states(&id("app1", "0001_initial")).unwrap();

        assert_eq!(states.len(), 1);
        assert!(states[0].from_state.is_empty());
        assert_eq!(states[0].to_state.len(), 1);
    }

    #[test]
    fn test_state_for_includes_target() {
        let graph = author_graph(vec![yob()]);
        let history = StateHistory::new(Planner::new(&graph));
        let state = history.state_for(&id("app1", "0002_yob")).unwrap();

        let author = state.get_entity(&EntityKey::new("app1", "Author")).unwrap();
        assert_eq!(author.field_names(), vec!["id", "name", "yob"]);
    }

    #[test]
    fn test_state_for_root_is_empty() {
        let graph = author_graph(vec![yob()]);
        let history = StateHistory::new(Planner::new(&graph));

        assert!(history.state_for(&MigrationId::root("app1")).unwrap().is_empty());
    }

    #[test]
    fn test_field_round_trip() {
        let graph = author_graph(vec![yob(), Action::delete_field("app1", "Author", "yob")]);
        let history = StateHistory::new(Planner::new(&graph));
        let states = history.action_states(&id("app1", "0002_yob")).unwrap();
        let key = EntityKey::new("app1", "Author");

        assert_eq!(states.len(), 2);
        assert_eq!(
            states[0].to_state.get_entity(&key).unwrap().field_names(),
            vec!["id", "name", "yob"]
        );
        assert_eq!(
            states[1].to_state.get_entity(&key),
            states[0].from_state.get_entity(&key)
        );
    }

    #[test]
    fn test_snapshots_do_not_alias() {
        let graph = author_graph(vec![yob()]);
        let history = StateHistory::new(Planner::new(&graph));
        let states = history.action_states(&id("app1", "0002_yob")).unwrap();
        let key = EntityKey::new("app1", "Author");

        assert_eq!(
            states[0].from_state.get_entity(&key).unwrap().field_names(),
            vec!["id", "name"]
        );
    }

    #[test]
    fn test_plan_action_states_match_single_replays() {
        let graph = author_graph(vec![yob()]);
        let planner = Planner::new(&graph);
        let plan = planner
            .plan(&[id("app1", "0002_yob")], &AppliedSet::new())
            .unwrap();
        let history = StateHistory::new(planner);
        let captured = history.plan_action_states(&plan).unwrap();

        assert_eq!(captured.len(), 2);
        for step in &plan {
            assert_eq!(
                captured[step.id()],
                history.action_states(step.id()).unwrap()
            );
        }
    }

    #[test]
    fn test_plan_action_states_skip_unplanned() {
        let graph = author_graph(vec![yob()]);
        let applied: AppliedSet = [id("app1", "0001_initial")].into_iter().collect();
        let planner = Planner::new(&graph);
        let plan = planner.plan(&[id("app1", "0002_yob")], &applied).unwrap();
        let captured = StateHistory::new(planner).plan_action_states(&plan).unwrap();

        assert_eq!(captured.len(), 1);
        let states = &captured[&id("app1", "0002_yob")];
        let key = EntityKey::new("app1", "Author");
        assert_eq!(
            states[0].from_state.get_entity(&key).unwrap().field_names(),
            vec!["id", "name"]
        );
    }

    #[test]
    fn test_replay_error_surfaces() {
        let graph = author_graph(vec![Action::delete_field("app1", "Author", "yob")]);
        let history = StateHistory::new(Planner::new(&graph));
        let result = history.state_for(&id("app1", "0002_yob"));

        assert!(matches!(
            result,
            Err(Error::State(StateError::UnknownField { .. }))
        ));
    }
}
