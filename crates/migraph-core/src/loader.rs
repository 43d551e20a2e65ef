//! Migration registry for one planning session.
//!
//! Takes the migrations a discovery source produced, synthesizes each
//! module's root, and builds the dependency graph.

use crate::error::{Error, GraphError, LoadError, Result};
use crate::graph::DependencyGraph;
use crate::migration::{Migration, MigrationId, ROOT_MIGRATION_NAME};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Supplies migrations grouped by module label.
pub trait Discovery {
    /// Every module's migrations. Order within a module does not matter.
    fn discover(&self) -> Result<BTreeMap<String, Vec<Migration>>>;
}

impl Discovery for BTreeMap<String, Vec<Migration>> {
    fn discover(&self) -> Result<BTreeMap<String, Vec<Migration>>> {
        Ok(self.clone())
    }
}

/// Loaded migrations and their dependency graph.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    graph: DependencyGraph,
    /// Per module, identities in application order, root first.
    modules: BTreeMap<String, Vec<MigrationId>>,
}

impl Loader {
    /// Load from a discovery source.
    pub fn from_discovery(discovery: &impl Discovery) -> Result<Self> {
        Self::new(discovery.discover()?)
    }

    /// Load the given modules.
    pub fn new(modules: impl IntoIterator<Item = (String, Vec<Migration>)>) -> Result<Self> {
        let mut loader = Loader::default();
        let mut declared: Vec<(MigrationId, Vec<MigrationId>)> = Vec::new();

        for (module, migrations) in modules {
            if loader.modules.contains_key(&module) {
                return Err(LoadError::DuplicateModule { module }.into());
            }
            let chain = loader.load_module(&module, migrations, &mut declared)?;
            loader.modules.insert(module, chain);
        }

        for (migration, dependencies) in &declared {
            for dependency in dependencies {
                loader.graph.link(migration, dependency)?;
            }
        }

        info!(
            modules = loader.modules.len(),
            migrations = loader.graph.len() - loader.modules.len(),
            "migrations loaded"
        );
        Ok(loader)
    }

    fn load_module(
        &mut self,
        module: &str,
        mut migrations: Vec<Migration>,
        declared: &mut Vec<(MigrationId, Vec<MigrationId>)>,
    ) -> Result<Vec<MigrationId>> {
        migrations.sort_by(|a, b| a.id.name.cmp(&b.id.name));

        let mut chain = vec![self.graph.add(Migration::root(module)).id.clone()];
        let mut names = HashSet::new();

        for migration in migrations {
            if migration.module() != module {
                return Err(Error::invariant(format!(
                    "{} was listed under module {}",
                    migration.id, module
                )));
            }
            if migration.name() == ROOT_MIGRATION_NAME {
                return Err(LoadError::ReservedName {
                    migration: migration.id,
                }
                .into());
            }
            if !names.insert(migration.id.name.clone()) {
                return Err(Error::invariant(format!(
                    "{} was supplied twice",
                    migration.id
                )));
            }
            if let Some(own) = migration.dependencies.iter().find(|d| d.module == module) {
                return Err(GraphError::SelfDependency {
                    migration: migration.id.clone(),
                    dependency: own.clone(),
                }
                .into());
            }
            declared.push((migration.id.clone(), migration.dependencies.clone()));
            chain.push(self.graph.add(migration).id.clone());
        }

        self.graph.link_chain(&chain)?;
        debug!(module, migrations = chain.len() - 1, "module loaded");
        Ok(chain)
    }

    /// The dependency graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Module labels, sorted.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// A module's migrations in application order, root first.
    pub fn migrations(&self, module: &str) -> Result<Vec<Arc<Migration>>> {
        self.chain(module)?
            .iter()
            .map(|id| Ok(Arc::clone(self.graph.get(id)?)))
            .collect()
    }

    /// Look up a migration by exact name.
    pub fn get_migration(&self, module: &str, name: &str) -> Result<Arc<Migration>> {
        let chain = self.chain(module)?;
        let id = chain
            .iter()
            .find(|id| id.name == name)
            .ok_or_else(|| LoadError::NonexistentMigration {
                module: module.to_string(),
                name: name.to_string(),
            })?;
        Ok(Arc::clone(self.graph.get(id)?))
    }

    /// Look up a migration by a unique name prefix.
    ///
    /// The root migration is never matched by prefix.
    pub fn get_migration_by_prefix(&self, module: &str, prefix: &str) -> Result<Arc<Migration>> {
        let chain = self.chain(module)?;
        let matches: Vec<&MigrationId> = chain
            .iter()
            .filter(|id| !id.is_root() && id.name.starts_with(prefix))
            .collect();

        match matches.as_slice() {
            [] => Err(LoadError::NonexistentMigration {
                module: module.to_string(),
                name: prefix.to_string(),
            }
            .into()),
            [id] => Ok(Arc::clone(self.graph.get(id)?)),
            _ => Err(LoadError::AmbiguousMigration {
                module: module.to_string(),
                prefix: prefix.to_string(),
                candidates: matches.iter().map(|id| id.name.clone()).collect(),
            }
            .into()),
        }
    }

    /// The last migration of a module, or its root if it has none.
    pub fn get_top_migration(&self, module: &str) -> Result<Arc<Migration>> {
        let chain = self.chain(module)?;
        let top = chain
            .last()
            .ok_or_else(|| Error::invariant(format!("module {} has no root", module)))?;
        Ok(Arc::clone(self.graph.get(top)?))
    }

    fn chain(&self, module: &str) -> Result<&[MigrationId]> {
        self.modules
            .get(module)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                LoadError::UnmigratedModule {
                    module: module.to_string(),
                }
                .into()
            })
    }
}
