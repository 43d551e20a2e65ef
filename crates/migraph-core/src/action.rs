//! Actions - declarative schema mutations carried by migrations.
//!
//! Each action knows how to apply itself to a [`SchemaState`]. Applying is a
//! pure function of the previous state and the action payload.

use crate::error::StateError;
use crate::state::{EntityKey, EntityState, FieldDef, SchemaState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the key field synthesized when an entity declares no primary key.
pub const DEFAULT_KEY_FIELD: &str = "id";

/// A single schema mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Create a new entity.
    CreateEntity {
        /// Entity to create.
        entity: EntityKey,
        /// Declared fields, in order.
        fields: Vec<FieldDef>,
        /// Entity options.
        options: BTreeMap<String, serde_json::Value>,
        /// Base types.
        bases: Vec<String>,
    },
    /// Delete an entity.
    DeleteEntity {
        /// Entity to delete.
        entity: EntityKey,
    },
    /// Set one option on an entity.
    AlterEntityOption {
        /// Entity to alter.
        entity: EntityKey,
        /// Option name.
        name: String,
        /// New option value.
        value: serde_json::Value,
    },
    /// Replace an entity's base types.
    AlterEntityBases {
        /// Entity to alter.
        entity: EntityKey,
        /// New base types.
        bases: Vec<String>,
    },
    /// Append a field to an entity.
    CreateField {
        /// Entity to alter.
        entity: EntityKey,
        /// Field to add.
        field: FieldDef,
    },
    /// Remove a field from an entity.
    DeleteField {
        /// Entity to alter.
        entity: EntityKey,
        /// Name of the field to remove.
        name: String,
    },
}

impl Action {
    /// Create an entity with the given fields.
    ///
    /// A primary key named `id` is prepended when no field is a primary key.
    pub fn create_entity(
        module: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Self {
        Action::CreateEntity {
            entity: EntityKey::new(module, name),
            fields: with_primary_key(fields),
            options: BTreeMap::new(),
            bases: Vec::new(),
        }
    }

    /// Delete an entity.
    pub fn delete_entity(module: impl Into<String>, name: impl Into<String>) -> Self {
        Action::DeleteEntity {
            entity: EntityKey::new(module, name),
        }
    }

    /// Set an entity option.
    pub fn alter_option(
        module: impl Into<String>,
        entity: impl Into<String>,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Action::AlterEntityOption {
            entity: EntityKey::new(module, entity),
            name: name.into(),
            value,
        }
    }

    /// Replace an entity's bases.
    pub fn alter_bases(
        module: impl Into<String>,
        entity: impl Into<String>,
        bases: Vec<String>,
    ) -> Self {
        Action::AlterEntityBases {
            entity: EntityKey::new(module, entity),
            bases,
        }
    }

    /// Add a field to an entity.
    pub fn create_field(
        module: impl Into<String>,
        entity: impl Into<String>,
        field: FieldDef,
    ) -> Self {
        Action::CreateField {
            entity: EntityKey::new(module, entity),
            field,
        }
    }

    /// Remove a field from an entity.
    pub fn delete_field(
        module: impl Into<String>,
        entity: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Action::DeleteField {
            entity: EntityKey::new(module, entity),
            name: name.into(),
        }
    }

    /// Set options on a `CreateEntity` action. Other variants are returned unchanged.
    pub fn with_options(mut self, new_options: BTreeMap<String, serde_json::Value>) -> Self {
        if let Action::CreateEntity { options, .. } = &mut self {
            *options = new_options;
        }
        self
    }

    /// Set bases on a `CreateEntity` action. Other variants are returned unchanged.
    pub fn with_bases(mut self, new_bases: Vec<String>) -> Self {
        if let Action::CreateEntity { bases, .. } = &mut self {
            *bases = new_bases;
        }
        self
    }

    /// The entity this action mutates.
    pub fn entity(&self) -> &EntityKey {
        match self {
            Action::CreateEntity { entity, .. }
            | Action::DeleteEntity { entity }
            | Action::AlterEntityOption { entity, .. }
            | Action::AlterEntityBases { entity, .. }
            | Action::CreateField { entity, .. }
            | Action::DeleteField { entity, .. } => entity,
        }
    }

    /// Apply this action's mutation to `state`.
    ///
    /// On error the state is left unchanged.
    pub fn apply_to(&self, state: &mut SchemaState) -> Result<(), StateError> {
        match self {
            Action::CreateEntity {
                entity,
                fields,
                options,
                bases,
            } => {
                if state.contains_entity(entity) {
                    return Err(StateError::DuplicateEntity {
                        action: self.to_string(),
                        entity: entity.clone(),
                    });
                }
                let fields = with_primary_key(fields.clone());
                if let Some(name) = first_duplicate(&fields) {
                    return Err(StateError::DuplicateField {
                        action: self.to_string(),
                        entity: entity.clone(),
                        field: name.to_string(),
                    });
                }
                let mut created = EntityState::new(&entity.module, &entity.name)
                    .with_fields(fields)
                    .with_bases(bases.clone());
                created.options = options.clone();
                state.insert_entity(created);
                Ok(())
            }
            Action::DeleteEntity { entity } => match state.remove_entity(entity) {
                Some(_) => Ok(()),
                None => Err(self.unknown_entity()),
            },
            Action::AlterEntityOption {
                entity,
                name,
                value,
            } => {
                let target = self.entity_mut(state, entity)?;
                target.options.insert(name.clone(), value.clone());
                Ok(())
            }
            Action::AlterEntityBases { entity, bases } => {
                let target = self.entity_mut(state, entity)?;
                target.bases = bases.clone();
                Ok(())
            }
            Action::CreateField { entity, field } => {
                let description = self.to_string();
                let target = self.entity_mut(state, entity)?;
                if target.has_field(&field.name) {
                    return Err(StateError::DuplicateField {
                        action: description,
                        entity: entity.clone(),
                        field: field.name.clone(),
                    });
                }
                target.fields.push(field.clone());
                Ok(())
            }
            Action::DeleteField { entity, name } => {
                let description = self.to_string();
                let target = self.entity_mut(state, entity)?;
                let position = target
                    .fields
                    .iter()
                    .position(|f| &f.name == name)
                    .ok_or_else(|| StateError::UnknownField {
                        action: description,
                        entity: entity.clone(),
                        field: name.clone(),
                    })?;
                target.fields.remove(position);
                Ok(())
            }
        }
    }

    fn entity_mut<'s>(
        &self,
        state: &'s mut SchemaState,
        entity: &EntityKey,
    ) -> Result<&'s mut EntityState, StateError> {
        state
            .get_entity_mut(entity)
            .ok_or_else(|| self.unknown_entity())
    }

    fn unknown_entity(&self) -> StateError {
        StateError::UnknownEntity {
            action: self.to_string(),
            entity: self.entity().clone(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateEntity { entity, .. } => write!(f, "Create entity {}", entity),
            Action::DeleteEntity { entity } => write!(f, "Delete entity {}", entity),
            Action::AlterEntityOption {
                entity,
                name,
                value,
            } => write!(f, "Set option {}={} on {}", name, value, entity),
            Action::AlterEntityBases { entity, bases } => {
                write!(f, "Set bases of {} to [{}]", entity, bases.join(", "))
            }
            Action::CreateField { entity, field } => {
                write!(f, "Create field {} on {}", field.name, entity)
            }
            Action::DeleteField { entity, name } => {
                write!(f, "Delete field {} from {}", name, entity)
            }
        }
    }
}

fn with_primary_key(mut fields: Vec<FieldDef>) -> Vec<FieldDef> {
    if !fields.iter().any(|f| f.primary_key) {
        fields.insert(0, FieldDef::auto_key(DEFAULT_KEY_FIELD));
    }
    fields
}

fn first_duplicate(fields: &[FieldDef]) -> Option<&str> {
    fields
        .iter()
        .enumerate()
        .find(|(i, f)| fields[..*i].iter().any(|g| g.name == f.name))
        .map(|(_, f)| f.name.as_str())
}
