//! Migration planner.
//!
//! Computes the ordered list of [`PlannedMigration`]s needed to move the
//! store from its applied-version set to a [`Target`]. Planning is a pure
//! function of the catalog, the applied ids and the target; it performs no
//! I/O.

use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::migration::PlannedMigration;
use crate::migration_id::MigrationId;
use std::collections::BTreeSet;

/// The state a plan should reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Apply every pending migration
    ApplyPending,
    /// Apply at most the next `n` pending migrations
    ApplyNext(usize),
    /// Revert the `n` most recently applied migrations
    Rollback(usize),
}

/// Plan the migrations required to reach `target`.
///
/// Pending migrations are emitted in ascending id order. A gap (an earlier
/// migration missing while a later one is applied) is filled in catalog
/// order alongside the other pending migrations. Rollbacks are emitted in
/// descending id order.
///
/// Fails with [`CoreError::UnknownMigration`] when `applied` holds an id the
/// catalog does not know, and with [`CoreError::NoRollbackAvailable`] when a
/// selected rollback has no Down block. Both checks happen before any plan
/// is returned.
pub fn plan<'a>(
    catalog: &'a Catalog,
    applied: &[MigrationId],
    target: Target,
) -> CoreResult<Vec<PlannedMigration<'a>>> {
    let applied: BTreeSet<&MigrationId> = applied.iter().collect();

    if let Some(unknown) = applied.iter().find(|id| !catalog.contains(id.as_str())) {
        return Err(CoreError::UnknownMigration {
            id: (*unknown).clone(),
        });
    }

    let planned = match target {
        Target::ApplyPending => plan_up(catalog, &applied, usize::MAX),
        Target::ApplyNext(limit) => plan_up(catalog, &applied, limit),
        Target::Rollback(steps) => plan_down(catalog, &applied, steps)?,
    };

    log::debug!(
        "Planned {} migration(s) for {:?}: [{}]",
        planned.len(),
        target,
        planned
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(planned)
}

fn plan_up<'a>(
    catalog: &'a Catalog,
    applied: &BTreeSet<&MigrationId>,
    limit: usize,
) -> Vec<PlannedMigration<'a>> {
    catalog
        .iter()
        .filter(|m| !applied.contains(m.id()))
        .take(limit)
        .map(PlannedMigration::up)
        .collect()
}

fn plan_down<'a>(
    catalog: &'a Catalog,
    applied: &BTreeSet<&MigrationId>,
    steps: usize,
) -> CoreResult<Vec<PlannedMigration<'a>>> {
    let mut planned = Vec::with_capacity(steps.min(applied.len()));
    for id in applied.iter().rev().take(steps) {
        let migration = catalog
            .get(id.as_str())
            .ok_or_else(|| CoreError::UnknownMigration { id: (*id).clone() })?;
        if !migration.is_reversible() {
            return Err(CoreError::NoRollbackAvailable {
                id: migration.id().clone(),
            });
        }
        planned.push(PlannedMigration::down(migration));
    }
    Ok(planned)
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
