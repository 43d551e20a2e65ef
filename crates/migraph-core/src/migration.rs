//! Migration identities and records.

use crate::action::Action;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the synthetic root migration present in every module.
///
/// Sorts before every real migration name.
pub const ROOT_MIGRATION_NAME: &str = "0000_root";

/// Identity of a migration: its module label plus its name.
///
/// Ordering is by module label, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MigrationId {
    /// Label of the owning module.
    pub module: String,
    /// Migration name, unique within the module.
    pub name: String,
}

impl MigrationId {
    /// Create a migration identity.
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Identity of a module's root migration.
    pub fn root(module: impl Into<String>) -> Self {
        Self::new(module, ROOT_MIGRATION_NAME)
    }

    /// Check if this identifies a root migration.
    pub fn is_root(&self) -> bool {
        self.name == ROOT_MIGRATION_NAME
    }

    /// Check if both identities belong to the same module.
    pub fn same_module(&self, other: &MigrationId) -> bool {
        self.module == other.module
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.name)
    }
}

/// One atomic, ordered set of actions scoped to a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    /// Identity of this migration.
    pub id: MigrationId,
    /// Actions in application order.
    pub actions: Vec<Action>,
    /// Declared prerequisites in other modules.
    pub dependencies: Vec<MigrationId>,
    #[serde(skip)]
    root: bool,
}

impl Migration {
    /// Create an empty migration.
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: MigrationId::new(module, name),
            actions: Vec::new(),
            dependencies: Vec::new(),
            root: false,
        }
    }

    /// Synthesize the root migration of a module.
    ///
    /// The root has no actions and no dependencies and stands for
    /// "nothing applied".
    pub fn root(module: impl Into<String>) -> Self {
        Self {
            id: MigrationId::root(module),
            actions: Vec::new(),
            dependencies: Vec::new(),
            root: true,
        }
    }

    /// Append an action.
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Append several actions.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Declare a dependency on a migration in another module.
    pub fn with_dependency(mut self, module: impl Into<String>, name: impl Into<String>) -> Self {
        self.dependencies.push(MigrationId::new(module, name));
        self
    }

    /// Module label.
    pub fn module(&self) -> &str {
        &self.id.module
    }

    /// Migration name.
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Check if this is a synthesized root migration.
    pub fn is_root(&self) -> bool {
        self.root
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}
