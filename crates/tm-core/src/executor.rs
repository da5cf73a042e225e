//! Plan execution.
//!
//! Walks a planned sequence strictly in order, one [`Driver::migrate`] call
//! per item, and stops at the first failure. The error reports which
//! migration failed, in which direction, and how many items completed
//! before it; `Driver::versions` shows the resulting state.

use crate::catalog::Catalog;
use crate::driver::Driver;
use crate::error::{CoreError, CoreResult};
use crate::migration::PlannedMigration;
use crate::planner::{plan, Target};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Execute `planned` against `driver`, returning the number of migrations
/// that completed.
///
/// `cancel` is checked before each item and raced against the in-flight
/// call. A cancelled run returns [`CoreError::Cancelled`]; the interrupted
/// item is left as the driver's cancellation contract describes.
pub async fn execute(
    driver: &dyn Driver,
    planned: &[PlannedMigration<'_>],
    cancel: &CancellationToken,
) -> CoreResult<usize> {
    let mut completed = 0;
    for item in planned {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled { completed });
        }

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            result = driver.migrate(item) => result,
            _ = cancel.cancelled() => return Err(CoreError::Cancelled { completed }),
        };

        if let Err(source) = result {
            log::error!("Migration {} ({}) failed: {}", item.id(), item.direction, source);
            return Err(CoreError::MigrationFailed {
                id: item.id().clone(),
                direction: item.direction,
                completed,
                source,
            });
        }

        completed += 1;
        log::info!(
            "Migrated {} ({}) in {}ms",
            item.id(),
            item.direction,
            start.elapsed().as_millis()
        );
    }
    Ok(completed)
}

/// Read the applied versions from `driver`, plan towards `target`, and
/// execute the plan.
pub async fn migrate(
    driver: &dyn Driver,
    catalog: &Catalog,
    target: Target,
    cancel: &CancellationToken,
) -> CoreResult<usize> {
    let applied = driver.versions().await?;
    let planned = plan(catalog, &applied, target)?;
    if planned.is_empty() {
        log::info!("No migrations to run against {}", driver.name());
        return Ok(0);
    }
    execute(driver, &planned, cancel).await
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
