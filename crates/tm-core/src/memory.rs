//! In-memory driver, the reference model of the [`Driver`] contract.
//!
//! The "store" is the list of committed statements plus the applied-version
//! list. Failures are injected explicitly per statement text or per version
//! record, so the transactional and non-transactional failure paths can be
//! exercised without a real database.

use crate::driver::Driver;
use crate::error::{DriverError, DriverResult};
use crate::migration::{Direction, PlannedMigration};
use crate::migration_id::MigrationId;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    applied: Vec<MigrationId>,
    effects: Vec<String>,
    closed: bool,
}

/// In-memory [`Driver`] implementation for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    state: Mutex<MemoryState>,
    failing_statements: HashSet<String>,
    failing_version_records: HashSet<MigrationId>,
}

impl MemoryDriver {
    /// Create an empty driver with nothing applied.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-applied version set.
    pub fn with_applied(applied: impl IntoIterator<Item = MigrationId>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                applied: applied.into_iter().collect(),
                ..MemoryState::default()
            }),
            ..Self::default()
        }
    }

    /// Make any statement equal to `statement` fail when executed.
    pub fn fail_statement(mut self, statement: impl Into<String>) -> Self {
        self.failing_statements.insert(statement.into());
        self
    }

    /// Make updating the version record of `id` fail.
    pub fn fail_version_record(mut self, id: MigrationId) -> Self {
        self.failing_version_records.insert(id);
        self
    }

    /// Statements whose effects have been committed, in execution order.
    pub fn effects(&self) -> DriverResult<Vec<String>> {
        Ok(self.state.lock()?.effects.clone())
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn migrate(&self, planned: &PlannedMigration<'_>) -> DriverResult<()> {
        let group = planned.statements()?;
        let id = planned.id();
        let mut state = self.state.lock()?;
        if state.closed {
            return Err(DriverError::Closed(self.name()));
        }

        // Transactional groups stage their effects until the version update succeeds
        let mut staged = Vec::new();
        for statement in &group.statements {
            if self.failing_statements.contains(statement) {
                return Err(DriverError::StatementExecutionError {
                    statement: statement.clone(),
                    source: "injected statement failure".into(),
                });
            }
            log::debug!("[{}] {}: {}", self.name(), planned, statement);
            if group.use_transaction {
                staged.push(statement.clone());
            } else {
                state.effects.push(statement.clone());
            }
        }

        if self.failing_version_records.contains(id) {
            return Err(DriverError::VersionRecordError {
                id: id.clone(),
                source: "injected version record failure".into(),
            });
        }

        state.effects.extend(staged);
        let position = state.applied.iter().position(|v| v == id);
        match (planned.direction, position) {
            (Direction::Up, None) => state.applied.push(id.clone()),
            (Direction::Down, Some(index)) => {
                state.applied.remove(index);
            }
            _ => {}
        }
        Ok(())
    }

    async fn versions(&self) -> DriverResult<Vec<MigrationId>> {
        let state = self.state.lock()?;
        if state.closed {
            return Err(DriverError::Closed(self.name()));
        }
        let mut versions = state.applied.clone();
        versions.sort_unstable_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    async fn close(&self) -> DriverResult<()> {
        let mut state = self.state.lock()?;
        if state.closed {
            return Err(DriverError::Closed(self.name()));
        }
        state.closed = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
