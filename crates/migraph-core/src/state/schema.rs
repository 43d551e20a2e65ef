//! Schema state - the project-wide set of entities at a point in history.

use super::entity::{EntityKey, EntityState};
use im::OrdMap;
use serde::{Deserialize, Serialize};

/// Every known entity of every module, keyed by `(module, entity)`.
///
/// Backed by a persistent ordered map: cloning is cheap and a clone never
/// observes mutations made through the other copy, so snapshots taken before
/// and after each action are fully independent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<EntityState>", into = "Vec<EntityState>")]
pub struct SchemaState {
    entities: OrdMap<EntityKey, EntityState>,
}

impl SchemaState {
    /// Create an empty schema state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, replacing any entity with the same key.
    pub fn with_entity(mut self, entity: EntityState) -> Self {
        self.insert_entity(entity);
        self
    }

    /// An independent copy of this state.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Insert an entity, returning the one it replaced.
    pub fn insert_entity(&mut self, entity: EntityState) -> Option<EntityState> {
        self.entities.insert(entity.key(), entity)
    }

    /// Remove an entity.
    pub fn remove_entity(&mut self, key: &EntityKey) -> Option<EntityState> {
        self.entities.remove(key)
    }

    /// Get an entity.
    pub fn get_entity(&self, key: &EntityKey) -> Option<&EntityState> {
        self.entities.get(key)
    }

    /// Get an entity for mutation.
    pub fn get_entity_mut(&mut self, key: &EntityKey) -> Option<&mut EntityState> {
        self.entities.get_mut(key)
    }

    /// Check if an entity exists.
    pub fn contains_entity(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Entity keys in `(module, name)` order.
    pub fn entity_keys(&self) -> Vec<EntityKey> {
        self.entities.keys().cloned().collect()
    }

    /// Iterate entities in `(module, name)` order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    /// Entities belonging to one module.
    pub fn module_entities<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a EntityState> {
        self.entities.values().filter(move |e| e.module == module)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if no entities are known.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl From<Vec<EntityState>> for SchemaState {
    fn from(entities: Vec<EntityState>) -> Self {
        entities
            .into_iter()
            .fold(SchemaState::new(), SchemaState::with_entity)
    }
}

impl From<SchemaState> for Vec<EntityState> {
    fn from(state: SchemaState) -> Self {
        state.entities.into_iter().map(|(_, entity)| entity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FieldDef, FieldType, ScalarType};

    fn sample_state() -> SchemaState {
        let author = EntityState::new("app1", "Author")
            .with_field(FieldDef::auto_key("id"))
            .with_field(FieldDef::new("name", FieldType::scalar(ScalarType::varchar(255))));
        let book = EntityState::new("app2", "Book")
            .with_field(FieldDef::auto_key("id"))
            .with_field(FieldDef::new("author", FieldType::reference("app1", "Author")));

        SchemaState::new().with_entity(book).with_entity(author)
    }

    #[test]
    fn test_keys_are_ordered() {
        let state = sample_state();

        assert_eq!(
            state.entity_keys(),
            vec![EntityKey::new("app1", "Author"), EntityKey::new("app2", "Book")]
        );
        assert_eq!(state.module_entities("app2").count(), 1);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut state = sample_state();
        let before = state.snapshot();
        let key = EntityKey::new("app1", "Author");

        state
            .get_entity_mut(&key)
            .unwrap()
            .fields
            .push(FieldDef::optional("yob", FieldType::optional_scalar(ScalarType::Int32)));
        state.remove_entity(&EntityKey::new("app2", "Book"));

        assert_eq!(before.len(), 2);
        assert_eq!(before.get_entity(&key).unwrap().field_names(), vec!["id", "name"]);
        assert_eq!(state.len(), 1);
        assert_eq!(state.get_entity(&key).unwrap().field_names(), vec!["id", "name", "yob"]);
    }

    #[test]
    fn test_json_roundtrip() {
        let state = sample_state();
        let json = serde_json::to_value(&state).unwrap();

        assert!(json.is_array());
        assert_eq!(json[0]["name"], "Author");

        let decoded: SchemaState = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, state);
    }
}
