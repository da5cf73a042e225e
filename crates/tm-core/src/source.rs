//! Migration sources and catalog loading.
//!
//! A source lists migration files and returns their text. The migration id
//! of a file is its name without the `.sql` extension.

use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::migration_id::MigrationId;
use crate::parser::parse_migration;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MIGRATION_EXTENSION: &str = ".sql";

/// Provider of raw migration files.
pub trait MigrationSource {
    /// Names of all migration files, in any order
    fn list_files(&self) -> CoreResult<Vec<String>>;

    /// Full text of one migration file
    fn read_file(&self, name: &str) -> CoreResult<String>;
}

/// Migrations held in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any previous file with the same name.
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }
}

impl MigrationSource for MemorySource {
    fn list_files(&self) -> CoreResult<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read_file(&self, name: &str) -> CoreResult<String> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::MigrationNotFound {
                name: name.to_string(),
            })
    }
}

/// `*.sql` files directly inside one directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationSource for DirectorySource {
    fn list_files(&self) -> CoreResult<Vec<String>> {
        let io_err = |source| CoreError::IoWithPath {
            path: self.dir.display().to_string(),
            source,
        };
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() {
                continue;
            }
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) if name.ends_with(MIGRATION_EXTENSION) => names.push(name.to_string()),
                Some(_) => {}
                None => log::warn!("Skipping non UTF-8 file name: {}", path.display()),
            }
        }
        Ok(names)
    }

    fn read_file(&self, name: &str) -> CoreResult<String> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(CoreError::MigrationNotFound {
                name: name.to_string(),
            });
        }
        std::fs::read_to_string(&path).map_err(|source| CoreError::IoWithPath {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Derive the migration id from a file name.
pub fn migration_id_from_file(name: &str) -> CoreResult<MigrationId> {
    let stem = name
        .strip_suffix(MIGRATION_EXTENSION)
        .ok_or_else(|| CoreError::InvalidMigrationName {
            name: name.to_string(),
            reason: format!("expected a '{MIGRATION_EXTENSION}' extension"),
        })?;
    MigrationId::try_new(stem).ok_or_else(|| CoreError::InvalidMigrationName {
        name: name.to_string(),
        reason: "file name has no id before the extension".to_string(),
    })
}

/// Result of loading every file of a source.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Successfully parsed migrations
    pub catalog: Catalog,

    /// One error per file that could not be read or parsed
    pub failures: Vec<CoreError>,
}

impl LoadOutcome {
    /// The catalog, or an error listing every failed file.
    pub fn into_catalog(self) -> CoreResult<Catalog> {
        if self.failures.is_empty() {
            return Ok(self.catalog);
        }
        let details = self
            .failures
            .iter()
            .map(|e| format!("  - {e}"))
            .collect::<Vec<_>>()
            .join("\n");
        Err(CoreError::InvalidMigrations {
            count: self.failures.len(),
            details,
        })
    }
}

/// Read and parse every file of `source`.
///
/// A file that fails to parse is recorded in [`LoadOutcome::failures`] and
/// does not prevent the remaining files from loading. Only a failure to
/// list the source aborts the load.
pub fn load(source: &dyn MigrationSource) -> CoreResult<LoadOutcome> {
    let mut outcome = LoadOutcome::default();
    let mut names = source.list_files()?;
    names.sort();

    for name in names {
        let parsed = migration_id_from_file(&name)
            .and_then(|id| source.read_file(&name).and_then(|text| parse_migration(id, &text)));
        match parsed {
            Ok(migration) => {
                if let Err(e) = outcome.catalog.insert(migration) {
                    outcome.failures.push(e);
                }
            }
            Err(e) => {
                log::warn!("Failed to load migration {name}: {e}");
                outcome.failures.push(e);
            }
        }
    }

    log::debug!(
        "Loaded {} migration(s), {} failure(s)",
        outcome.catalog.len(),
        outcome.failures.len()
    );
    Ok(outcome)
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
