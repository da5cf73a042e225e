//! Migration model: statement groups, migrations, and planned migrations.

use crate::error::{DriverError, DriverResult};
use crate::migration_id::MigrationId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction a migration is executed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply the forward statements and record the version
    Up,
    /// Apply the reverse statements and remove the version record
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// An ordered group of statements for one direction of a migration.
///
/// When `use_transaction` is set, all statements and the version-record
/// update are executed as one atomic unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedMigration {
    /// Statements in source order
    pub statements: Vec<String>,

    /// Whether the group must run inside a single transaction
    pub use_transaction: bool,
}

impl ParsedMigration {
    /// Build a transactional group from the given statements.
    pub fn transactional<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
            use_transaction: true,
        }
    }

    /// Build a group whose statements run independently of each other.
    pub fn non_transactional<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
            use_transaction: false,
        }
    }

    /// True when the group holds no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// One migration unit. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    id: MigrationId,
    up: ParsedMigration,
    down: Option<ParsedMigration>,
}

impl Migration {
    /// Create a migration. An empty `down` group is normalised to `None`,
    /// making the migration irreversible.
    pub fn new(id: MigrationId, up: ParsedMigration, down: Option<ParsedMigration>) -> Self {
        Self {
            id,
            up,
            down: down.filter(|d| !d.is_empty()),
        }
    }

    /// Migration identifier
    pub fn id(&self) -> &MigrationId {
        &self.id
    }

    /// Forward statements
    pub fn up(&self) -> &ParsedMigration {
        &self.up
    }

    /// Reverse statements, if the migration can be rolled back
    pub fn down(&self) -> Option<&ParsedMigration> {
        self.down.as_ref()
    }

    /// Whether a Down block exists.
    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }

    /// Statement group for the given direction.
    pub fn statements_for(&self, direction: Direction) -> Option<&ParsedMigration> {
        match direction {
            Direction::Up => Some(&self.up),
            Direction::Down => self.down.as_ref(),
        }
    }
}

/// A migration paired with the direction it should run in.
///
/// Produced by the planner and consumed once by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMigration<'a> {
    /// The migration to run
    pub migration: &'a Migration,

    /// Direction to run it in
    pub direction: Direction,
}

impl<'a> PlannedMigration<'a> {
    pub fn up(migration: &'a Migration) -> Self {
        Self {
            migration,
            direction: Direction::Up,
        }
    }

    pub fn down(migration: &'a Migration) -> Self {
        Self {
            migration,
            direction: Direction::Down,
        }
    }

    /// Identifier of the planned migration
    pub fn id(&self) -> &'a MigrationId {
        &self.migration.id
    }

    /// The statement group matching the planned direction.
    ///
    /// The planner never emits a Down item for an irreversible migration, so
    /// [`DriverError::MissingBlock`] only occurs for hand-built plans.
    pub fn statements(&self) -> DriverResult<&'a ParsedMigration> {
        self.migration
            .statements_for(self.direction)
            .ok_or_else(|| DriverError::MissingBlock {
                id: self.migration.id.clone(),
                direction: self.direction,
            })
    }
}

impl fmt::Display for PlannedMigration<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction, self.migration.id)
    }
}
