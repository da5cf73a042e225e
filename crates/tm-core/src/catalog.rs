//! In-memory migration registry, indexed and ordered by migration id.

use crate::error::{CoreError, CoreResult};
use crate::migration::Migration;
use crate::migration_id::MigrationId;
use std::collections::BTreeMap;

/// The static set of known migrations for one planning run.
///
/// Iteration order is ascending by [`MigrationId`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    migrations: BTreeMap<MigrationId, Migration>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids.
    pub fn new(migrations: impl IntoIterator<Item = Migration>) -> CoreResult<Self> {
        let mut catalog = Self::default();
        for migration in migrations {
            catalog.insert(migration)?;
        }
        Ok(catalog)
    }

    /// Add a migration, rejecting an id that is already registered.
    pub fn insert(&mut self, migration: Migration) -> CoreResult<()> {
        if self.migrations.contains_key(migration.id()) {
            return Err(CoreError::DuplicateMigration {
                id: migration.id().clone(),
            });
        }
        self.migrations.insert(migration.id().clone(), migration);
        Ok(())
    }

    /// Look up a migration by id
    pub fn get(&self, id: &str) -> Option<&Migration> {
        self.migrations.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.migrations.contains_key(id)
    }

    /// Migrations in ascending id order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Migration> {
        self.migrations.values()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
