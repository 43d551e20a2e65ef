//! Forward and reverse adjacency between migrations.

use super::resolve::{resolve, TraversalError};
use crate::error::GraphError;
use crate::migration::{Migration, MigrationId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Which adjacency a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edges {
    /// Follow prerequisites (towards the roots).
    Prerequisites,
    /// Follow dependents (away from the roots).
    Dependents,
}

/// Dependency graph over migration records.
///
/// `forward[m]` lists what `m` must be applied after; `reverse[m]` lists what
/// must be applied after `m`. Cycles are not rejected on insertion; they are
/// reported by [`DependencyGraph::resolve`].
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<MigrationId, Arc<Migration>>,
    forward: HashMap<MigrationId, Vec<MigrationId>>,
    reverse: HashMap<MigrationId, Vec<MigrationId>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration with empty adjacency.
    ///
    /// Re-registering an identity replaces the record and keeps its edges.
    pub fn add(&mut self, migration: Migration) -> Arc<Migration> {
        let id = migration.id.clone();
        let migration = Arc::new(migration);
        self.forward.entry(id.clone()).or_default();
        self.reverse.entry(id.clone()).or_default();
        self.nodes.insert(id, Arc::clone(&migration));
        migration
    }

    /// Add a cross-module edge: `migration` must be applied after `prerequisite`.
    pub fn link(
        &mut self,
        migration: &MigrationId,
        prerequisite: &MigrationId,
    ) -> Result<(), GraphError> {
        if !self.contains(migration) {
            return Err(GraphError::UnknownMigration {
                migration: migration.clone(),
            });
        }
        if !self.contains(prerequisite) {
            return Err(GraphError::UnknownDependency {
                migration: migration.clone(),
                dependency: prerequisite.clone(),
            });
        }
        if migration.same_module(prerequisite) {
            return Err(GraphError::SelfDependency {
                migration: migration.clone(),
                dependency: prerequisite.clone(),
            });
        }
        self.insert_edge(migration, prerequisite);
        Ok(())
    }

    /// Link each migration of a module after the previous one.
    ///
    /// `chain` must be in application order, starting with the root.
    pub(crate) fn link_chain(&mut self, chain: &[MigrationId]) -> Result<(), GraphError> {
        for pair in chain.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            for id in [previous, next] {
                if !self.contains(id) {
                    return Err(GraphError::UnknownMigration {
                        migration: id.clone(),
                    });
                }
            }
            self.insert_edge(next, previous);
        }
        Ok(())
    }

    fn insert_edge(&mut self, migration: &MigrationId, prerequisite: &MigrationId) {
        let forward = self.forward.entry(migration.clone()).or_default();
        if !forward.contains(prerequisite) {
            forward.push(prerequisite.clone());
        }
        let reverse = self.reverse.entry(prerequisite.clone()).or_default();
        if !reverse.contains(migration) {
            reverse.push(migration.clone());
        }
    }

    /// Check if a migration is registered.
    pub fn contains(&self, id: &MigrationId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get a registered migration record.
    pub fn get(&self, id: &MigrationId) -> Result<&Arc<Migration>, GraphError> {
        self.nodes.get(id).ok_or_else(|| GraphError::UnknownMigration {
            migration: id.clone(),
        })
    }

    /// Migrations `id` must be applied after.
    pub fn prerequisites_of(&self, id: &MigrationId) -> Result<&[MigrationId], GraphError> {
        self.adjacency(&self.forward, id)
    }

    /// Migrations that must be applied after `id`.
    pub fn dependents_of(&self, id: &MigrationId) -> Result<&[MigrationId], GraphError> {
        self.adjacency(&self.reverse, id)
    }

    fn adjacency<'a>(
        &'a self,
        edges: &'a HashMap<MigrationId, Vec<MigrationId>>,
        id: &MigrationId,
    ) -> Result<&'a [MigrationId], GraphError> {
        edges
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| GraphError::UnknownMigration {
                migration: id.clone(),
            })
    }

    /// Order `target` and everything reachable from it along `edges`.
    ///
    /// Following [`Edges::Prerequisites`], every prerequisite of a migration
    /// precedes it. Following [`Edges::Dependents`], every dependent precedes
    /// the migration it depends on, which is the order to unapply in. Ties are
    /// broken by `(module, name)`, so the result is the same on every call.
    pub fn resolve(
        &self,
        target: &MigrationId,
        edges: Edges,
        limit: Option<usize>,
    ) -> Result<Vec<MigrationId>, GraphError> {
        if !self.contains(target) {
            return Err(GraphError::UnknownMigration {
                migration: target.clone(),
            });
        }
        let adjacency = match edges {
            Edges::Prerequisites => &self.forward,
            Edges::Dependents => &self.reverse,
        };
        resolve(
            target,
            |id| adjacency.get(id).cloned().unwrap_or_default(),
            |id| id.clone(),
            limit,
        )
        .map_err(|e| match e {
            TraversalError::Cycle(cycle) => GraphError::CircularDependency { cycle },
            TraversalError::TooLarge { limit } => GraphError::PlanTooLarge { limit },
        })
    }

    /// All registered migration identities, ordered by `(module, name)`.
    pub fn ids(&self) -> impl Iterator<Item = &MigrationId> {
        self.nodes.keys()
    }

    /// Root migrations of every registered module.
    pub fn roots(&self) -> impl Iterator<Item = &MigrationId> {
        self.nodes
            .iter()
            .filter(|(_, m)| m.is_root())
            .map(|(id, _)| id)
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
