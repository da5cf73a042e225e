//! Driver trait definition

use crate::error::DriverResult;
use crate::migration::PlannedMigration;
use crate::migration_id::MigrationId;
use async_trait::async_trait;

/// Backend capability the executor drives.
///
/// A driver owns its connection exclusively. Calls are serialized by the
/// caller: no two `migrate` calls run concurrently against one driver, and
/// `close` is never issued while a `migrate` is outstanding. Dropping a
/// pending future cancels the call; the store is then left as described on
/// [`migrate`](Driver::migrate).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Execute the statement group matching `planned.direction`, then record
    /// (Up) or remove (Down) the migration id in the version table.
    ///
    /// Transactional groups run their statements and the version update as
    /// one atomic unit. Non-transactional groups run statements one by one
    /// and stop at the first failure, leaving earlier statements applied and
    /// the version record untouched.
    async fn migrate(&self, planned: &PlannedMigration<'_>) -> DriverResult<()>;

    /// All applied migration ids, highest first.
    async fn versions(&self) -> DriverResult<Vec<MigrationId>>;

    /// Release held resources. Later calls fail with `Closed`.
    async fn close(&self) -> DriverResult<()>;

    /// Driver type identifier for logging
    fn name(&self) -> &'static str;
}

/// Check that a version table name is a plain, optionally schema-qualified
/// identifier before it is interpolated into SQL.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
