//! tm-core - Core library for Tidemark
//!
//! This crate provides the migration model, the statement parser, the
//! planner and executor, the `Driver` trait with an in-memory reference
//! driver, migration sources, and configuration parsing.

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod memory;
pub mod migration;
pub mod migration_id;
pub mod parser;
pub mod planner;
pub mod source;
pub mod status;

pub use catalog::Catalog;
pub use config::{Config, DatabaseConfig, DbType};
pub use driver::Driver;
pub use error::{CoreError, CoreResult, DriverError, DriverResult};
pub use executor::{execute, migrate};
pub use memory::MemoryDriver;
pub use migration::{Direction, Migration, ParsedMigration, PlannedMigration};
pub use migration_id::MigrationId;
pub use parser::parse_migration;
pub use planner::{plan, Target};
pub use source::{load, DirectorySource, LoadOutcome, MemorySource, MigrationSource};
pub use status::{status, MigrationStatus, StatusReport};
