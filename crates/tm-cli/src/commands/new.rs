//! New command implementation

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::cli::{GlobalArgs, NewArgs};
use crate::commands::common::load_project;

const TEMPLATE: &str = "-- +migrate Up\n\n\n-- +migrate Down\n\n";

/// Execute the new command
pub async fn execute(args: &NewArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let dir = project.migration_dir();
    let path = create_migration_file(&dir, &args.name, Utc::now())?;
    println!("Created {}", path.display());
    Ok(())
}

/// Write an empty migration named `{timestamp}_{name}.sql` into `dir`.
///
/// The directory is created if missing. Existing files are never overwritten.
pub(crate) fn create_migration_file(
    dir: &Path,
    name: &str,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    validate_name(name)?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create migration directory {}", dir.display()))?;

    let file_name = format!("{}_{}.sql", now.format("%Y%m%d%H%M%S"), name);
    let path = dir.join(file_name);
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            bail!("Migration file already exists: {}", path.display())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to create {}", path.display()));
        }
    };
    file.write_all(TEMPLATE.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::debug!("Wrote migration template to {}", path.display());
    Ok(path)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Migration name cannot be empty");
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        bail!(
            "Invalid migration name '{}': character '{}' is not allowed (use letters, digits, '_' or '-')",
            name,
            c
        );
    }
    Ok(())
}

#[cfg(test)]
#[path = "new_test.rs"]
mod tests;
