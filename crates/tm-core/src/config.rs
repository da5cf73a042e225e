//! Configuration types and parsing for tidemark.yml

use crate::driver::is_valid_table_name;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Project configuration from tidemark.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding the `*.sql` migration files, relative to the project
    #[serde(default = "default_migration_dir")]
    pub migration_dir: String,

    /// Table recording applied migration versions
    #[serde(default = "default_version_table")]
    pub version_table: String,

    /// Default database connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Named target configurations (e.g., dev, staging, prod)
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Target-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Database connection for this target
    pub database: DatabaseConfig,
}

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// DuckDB (default)
    #[default]
    DuckDb,
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbType::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database type
    #[serde(rename = "type", default)]
    pub db_type: DbType,

    /// Database path (file path or :memory:)
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DbType::default(),
            path: default_db_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            migration_dir: default_migration_dir(),
            version_table: default_version_table(),
            database: DatabaseConfig::default(),
            targets: HashMap::new(),
        }
    }
}

fn default_migration_dir() -> String {
    "migrations".to_string()
}

fn default_version_table() -> String {
    "schema_migration".to_string()
}

fn default_db_path() -> String {
    ":memory:".to_string()
}

impl Config {
    /// Config file names probed by [`Config::load_from_dir`], in order.
    pub const FILE_NAMES: [&'static str; 2] = ["tidemark.yml", "tidemark.yaml"];

    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        Self::FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .map(|path| Self::load(&path))
            .unwrap_or_else(|| {
                Err(CoreError::ConfigNotFound {
                    path: dir.join(Self::FILE_NAMES[0]).display().to_string(),
                })
            })
    }

    fn validate(&self) -> CoreResult<()> {
        if !is_valid_table_name(&self.version_table) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "version_table '{}' must be a plain identifier",
                    self.version_table
                ),
            });
        }
        if self.migration_dir.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "migration_dir must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Absolute path of the migration directory for a project root
    pub fn migration_dir_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.migration_dir)
    }

    /// Database configuration for the given target, or the default one.
    pub fn get_database_config(&self, target: Option<&str>) -> CoreResult<DatabaseConfig> {
        match target {
            None => Ok(self.database.clone()),
            Some(name) => self
                .targets
                .get(name)
                .map(|t| t.database.clone())
                .ok_or_else(|| {
                    let mut available: Vec<&str> =
                        self.targets.keys().map(String::as_str).collect();
                    available.sort_unstable();
                    CoreError::ConfigInvalid {
                        message: format!(
                            "target '{}' not found (available: {})",
                            name,
                            if available.is_empty() {
                                "none".to_string()
                            } else {
                                available.join(", ")
                            }
                        ),
                    }
                }),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
