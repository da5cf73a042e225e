//! Error types for tm-core

use crate::migration::Direction;
use crate::migration_id::MigrationId;
use thiserror::Error;

/// Boxed backend error carried inside [`DriverError`] variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for Tidemark
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Invalid configuration value
    #[error("[E002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E003: Malformed migration source
    #[error("[E003] Parse error in migration {id} ({direction} block, line {line}): {message}")]
    ParseError {
        id: MigrationId,
        direction: Direction,
        line: usize,
        message: String,
    },

    /// E004: Two migrations share the same identifier
    #[error("[E004] Duplicate migration id: {id}")]
    DuplicateMigration { id: MigrationId },

    /// E005: The store reports an applied migration the catalog does not know
    #[error("[E005] Applied migration {id} is not present in the migration catalog")]
    UnknownMigration { id: MigrationId },

    /// E006: A rollback was planned for an irreversible migration
    #[error("[E006] Migration {id} has no Down block and cannot be rolled back")]
    NoRollbackAvailable { id: MigrationId },

    /// E007: A planned migration failed during execution
    #[error(
        "[E007] Migration {id} ({direction}) failed after {completed} planned migration(s) completed: {source}"
    )]
    MigrationFailed {
        id: MigrationId,
        direction: Direction,
        completed: usize,
        #[source]
        source: DriverError,
    },

    /// E008: Execution was cancelled before the plan finished
    #[error("[E008] Migration run cancelled after {completed} planned migration(s) completed")]
    Cancelled { completed: usize },

    /// E009: One or more migration files failed to parse
    #[error("[E009] {count} migration file(s) failed to load:\n{details}")]
    InvalidMigrations { count: usize, details: String },

    /// E010: Migration file not found in source
    #[error("[E010] Migration file not found: {name}")]
    MigrationNotFound { name: String },

    /// E011: Invalid migration file name
    #[error("[E011] Invalid migration file name '{name}': {reason}")]
    InvalidMigrationName { name: String, reason: String },

    /// IO error with file path context
    #[error("[E012] IO error at {path}: {source}")]
    IoWithPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error
    #[error("[E013] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Driver error raised outside of plan execution (e.g. reading versions)
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by [`Driver`](crate::driver::Driver) implementations.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// A migration statement failed (D002)
    #[error("[D002] Error executing statement: {source}\n{statement}")]
    StatementExecutionError {
        statement: String,
        #[source]
        source: BoxError,
    },

    /// Statements ran but the version record could not be updated (D003)
    #[error("[D003] Error updating migration version record for {id}: {source}")]
    VersionRecordError {
        id: MigrationId,
        #[source]
        source: BoxError,
    },

    /// Reading the applied versions failed (D004)
    #[error("[D004] Failed to read applied versions: {0}")]
    VersionQueryError(String),

    /// Begin/commit/rollback failure (D005)
    #[error("[D005] Transaction failed: {0}")]
    TransactionError(String),

    /// Driver used after close (D006)
    #[error("[D006] Driver {0} is closed")]
    Closed(&'static str),

    /// Mutex poisoned (D007)
    #[error("[D007] Driver mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Version table name is not a plain identifier (D008)
    #[error("[D008] Invalid version table name '{0}'")]
    InvalidTableName(String),

    /// Planned direction has no statement group (D009)
    #[error("[D009] Migration {id} has no {direction} block")]
    MissingBlock { id: MigrationId, direction: Direction },

    /// Call abandoned by its caller before it finished (D010)
    #[error("[D010] Driver call interrupted: {0}")]
    Interrupted(String),
}

/// Result type alias for DriverError
pub type DriverResult<T> = Result<T, DriverError>;

impl<T> From<std::sync::PoisonError<T>> for DriverError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        DriverError::MutexPoisoned(err.to_string())
    }
}
