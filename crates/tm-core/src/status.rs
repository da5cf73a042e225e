//! Applied/pending status report.

use crate::catalog::Catalog;
use crate::migration_id::MigrationId;
use serde::Serialize;
use std::collections::BTreeSet;

/// Status of one catalog migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub id: MigrationId,
    pub applied: bool,
    pub reversible: bool,
}

/// Catalog migrations joined against the store's applied set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// One entry per catalog migration, ascending by id
    pub migrations: Vec<MigrationStatus>,

    /// Applied ids the catalog does not know, ascending
    pub unknown: Vec<MigrationId>,
}

impl StatusReport {
    /// Number of catalog migrations not yet applied
    pub fn pending_count(&self) -> usize {
        self.migrations.iter().filter(|m| !m.applied).count()
    }

    /// Number of catalog migrations already applied
    pub fn applied_count(&self) -> usize {
        self.migrations.iter().filter(|m| m.applied).count()
    }

    /// True when the store references migrations missing from the catalog.
    pub fn has_drift(&self) -> bool {
        !self.unknown.is_empty()
    }
}

/// Build a status report. Unlike planning, drift is reported, not rejected.
pub fn status(catalog: &Catalog, applied: &[MigrationId]) -> StatusReport {
    let applied: BTreeSet<&MigrationId> = applied.iter().collect();
    let migrations = catalog
        .iter()
        .map(|m| MigrationStatus {
            id: m.id().clone(),
            applied: applied.contains(m.id()),
            reversible: m.is_reversible(),
        })
        .collect();
    let unknown = applied
        .into_iter()
        .filter(|id| !catalog.contains(id.as_str()))
        .cloned()
        .collect();
    StatusReport {
        migrations,
        unknown,
    }
}
