//! Integration tests for loading, planning, state reconstruction and execution.
//!
//! Fixture: app1 creates Author, then adds `yob` to it once app2 has created
//! Book. app2 has a single migration.

use migraph_core::{
    Action, AppliedSet, Direction, Error, FieldDef, FieldType, LoadError, Loader, Migration,
    MigrationId, Migrator, Planner, ProgressHooks, ScalarType, SchemaBackend, SchemaChange,
    StateHistory, TracingHooks, ROOT_MIGRATION_NAME,
};
use std::collections::BTreeMap;

fn id(module: &str, name: &str) -> MigrationId {
    MigrationId::new(module, name)
}

fn fixture() -> BTreeMap<String, Vec<Migration>> {
    let author = Migration::new("app1", "0001_initial").with_action(Action::create_entity(
        "app1",
        "Author",
        vec![FieldDef::new("name", FieldType::scalar(ScalarType::varchar(255)))],
    ));
    let yob = Migration::new("app1", "0002_yob")
        .with_dependency("app2", "0001_initial")
        .with_action(Action::create_field(
            "app1",
            "Author",
            FieldDef::optional("yob", FieldType::optional_scalar(ScalarType::Int32)),
        ));
    let book = Migration::new("app2", "0001_initial").with_action(Action::create_entity(
        "app2",
        "Book",
        vec![
            FieldDef::new("title", FieldType::scalar(ScalarType::varchar(100))),
            FieldDef::new("author", FieldType::reference("app1", "Author")),
        ],
    ));

    let mut modules = BTreeMap::new();
    modules.insert("app1".to_string(), vec![yob, author]);
    modules.insert("app2".to_string(), vec![book]);
    modules
}

fn loader() -> Loader {
    Loader::from_discovery(&fixture()).unwrap()
}

fn all_applied() -> AppliedSet {
    [
        id("app1", "0001_initial"),
        id("app1", "0002_yob"),
        id("app2", "0001_initial"),
    ]
    .into_iter()
    .collect()
}

fn plan(loader: &Loader, targets: &[MigrationId], applied: &AppliedSet) -> Vec<(Direction, MigrationId)> {
    Planner::new(loader.graph())
        .plan(targets, applied)
        .unwrap()
        .entries()
}

#[test]
fn test_load() {
    let loader = loader();

    assert_eq!(loader.modules().collect::<Vec<_>>(), vec!["app1", "app2"]);
    let app2: Vec<String> = loader
        .migrations("app2")
        .unwrap()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(app2, vec![ROOT_MIGRATION_NAME, "0001_initial"]);

    let initial = loader.get_migration("app1", "0001_initial").unwrap();
    assert_eq!(initial.module(), "app1");
    assert_eq!(initial.name(), "0001_initial");
    match &initial.actions[0] {
        Action::CreateEntity { fields, .. } => assert_eq!(fields.len(), 2),
        other => panic!("unexpected action: {other}"),
    }

    let graph = loader.graph();
    assert_eq!(
        graph.prerequisites_of(&id("app1", "0002_yob")).unwrap(),
        &[id("app1", "0001_initial"), id("app2", "0001_initial")]
    );
    assert_eq!(
        graph.dependents_of(&id("app2", "0001_initial")).unwrap(),
        &[id("app1", "0002_yob")]
    );
}

#[test]
fn test_lookups() {
    let loader = loader();

    assert_eq!(
        loader.get_migration_by_prefix("app1", "0002").unwrap(),
        loader.get_migration("app1", "0002_yob").unwrap()
    );
    assert!(matches!(
        loader.get_migration_by_prefix("app1", "000"),
        Err(Error::Load(LoadError::AmbiguousMigration { .. }))
    ));
    assert!(matches!(
        loader.get_migration("app3", "0001"),
        Err(Error::Load(LoadError::UnmigratedModule { .. }))
    ));
    assert_eq!(
        loader.get_top_migration("app2").unwrap().id,
        id("app2", "0001_initial")
    );
}

#[test]
fn test_plan_one_dependency() {
    let loader = loader();

    assert_eq!(
        plan(&loader, &[id("app1", "0002_yob")], &AppliedSet::new()),
        vec![
            (Direction::Forwards, id("app2", "0001_initial")),
            (Direction::Forwards, id("app1", "0001_initial")),
            (Direction::Forwards, id("app1", "0002_yob")),
        ]
    );
}

#[test]
fn test_plan_single() {
    let loader = loader();

    assert_eq!(
        plan(&loader, &[id("app1", "0001_initial")], &AppliedSet::new()),
        vec![(Direction::Forwards, id("app1", "0001_initial"))]
    );
}

#[test]
fn test_plan_noop() {
    let loader = loader();

    assert!(plan(&loader, &[id("app1", "0002_yob")], &all_applied()).is_empty());
}

#[test]
fn test_plan_no_cross_module_removal() {
    let loader = loader();

    assert!(plan(&loader, &[id("app2", "0001_initial")], &all_applied()).is_empty());
}

#[test]
fn test_plan_partial_undo() {
    let loader = loader();

    assert_eq!(
        plan(&loader, &[id("app1", "0001_initial")], &all_applied()),
        vec![(Direction::Backwards, id("app1", "0002_yob"))]
    );
}

#[test]
fn test_plan_full_undo_of_one_module() {
    let loader = loader();

    assert_eq!(
        plan(&loader, &[MigrationId::root("app2")], &all_applied()),
        vec![
            (Direction::Backwards, id("app1", "0002_yob")),
            (Direction::Backwards, id("app2", "0001_initial")),
        ]
    );
}

#[test]
fn test_plan_full_undo() {
    let loader = loader();

    assert_eq!(
        plan(
            &loader,
            &[MigrationId::root("app1"), MigrationId::root("app2")],
            &all_applied()
        ),
        vec![
            (Direction::Backwards, id("app1", "0002_yob")),
            (Direction::Backwards, id("app1", "0001_initial")),
            (Direction::Backwards, id("app2", "0001_initial")),
        ]
    );
}

#[test]
fn test_state_empty() {
    let loader = loader();
    let history = StateHistory::new(Planner::new(loader.graph()));
    let states = history.action_states(&id("app1", "0001_initial")).unwrap();

    assert!(states[0].from_state.is_empty());
}

#[test]
fn test_state_full() {
    let loader = loader();
    let history = StateHistory::new(Planner::new(loader.graph()));
    let states = history.action_states(&id("app1", "0002_yob")).unwrap();

    let keys: Vec<String> = states[0]
        .from_state
        .entity_keys()
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(keys, vec!["app1.Author", "app2.Book"]);

    let last = &states[states.len() - 1].to_state;
    let author = last
        .entities()
        .find(|e| e.name == "Author")
        .unwrap();
    assert_eq!(author.field_names(), vec!["id", "name", "yob"]);
}

#[test]
fn test_migrator_state_for() {
    let loader = loader();
    let state = Migrator::new(&loader).state_for("app2", "0001_initial").unwrap();

    assert_eq!(state.len(), 1);
    assert_eq!(
        state.module_entities("app2").next().unwrap().field_names(),
        vec!["id", "title", "author"]
    );
}

#[derive(Default)]
struct Ledger {
    changes: Vec<String>,
}

impl SchemaBackend for Ledger {
    fn alter_schema(
        &mut self,
        change: &SchemaChange<'_>,
    ) -> Result<(), migraph_core::BackendError> {
        self.changes
            .push(format!("{} {}", change.direction, change.action));
        Ok(())
    }
}

#[derive(Default)]
struct Counter {
    started: usize,
    finished: usize,
}

impl ProgressHooks for Counter {
    fn migration_start(&mut self, _step: &migraph_core::PlanStep) {
        self.started += 1;
    }

    fn migration_end(&mut self, _step: &migraph_core::PlanStep) {
        self.finished += 1;
    }
}

#[test]
fn test_migrate_up_and_down() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("migraph_core=debug")
        .try_init();

    let loader = loader();
    let migrator = Migrator::new(&loader);
    let mut applied = AppliedSet::new();
    let mut ledger = Ledger::default();

    let up = migrator.calculate_plan(None, None, &applied).unwrap();
    let result = migrator
        .execute_plan(&up, &mut ledger, &mut TracingHooks, &mut applied)
        .unwrap();
    assert_eq!(result.migrations_executed, 3);
    assert_eq!(applied, all_applied());
    assert_eq!(
        ledger.changes,
        vec![
            "forwards Create entity app2.Book",
            "forwards Create entity app1.Author",
            "forwards Create field yob on app1.Author",
        ]
    );

    // Executing again is a no-op.
    let again = migrator.calculate_plan(None, None, &applied).unwrap();
    assert!(again.is_empty());

    let down = migrator
        .calculate_plan(Some("app2"), Some(ROOT_MIGRATION_NAME), &applied)
        .unwrap();
    let mut counter = Counter::default();
    migrator
        .execute_plan(&down, &mut ledger, &mut counter, &mut applied)
        .unwrap();

    assert_eq!((counter.started, counter.finished), (2, 2));
    assert_eq!(
        applied.into_iter().collect::<Vec<_>>(),
        vec![id("app1", "0001_initial")]
    );
    assert_eq!(
        &ledger.changes[3..],
        &[
            "backwards Create field yob on app1.Author".to_string(),
            "backwards Create entity app2.Book".to_string(),
        ]
    );
}
