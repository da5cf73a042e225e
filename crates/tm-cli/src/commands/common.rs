//! Shared helpers for CLI commands

use anyhow::{Context, Result};
use std::path::PathBuf;
use tm_core::{
    load, plan, Catalog, Config, Direction, DirectorySource, Driver, PlannedMigration, Target,
};
use tm_db::DuckDbDriver;
use tokio_util::sync::CancellationToken;

use crate::cli::GlobalArgs;

/// A loaded project: its root directory and configuration.
pub(crate) struct Project {
    pub root: PathBuf,
    pub config: Config,
}

impl Project {
    pub fn migration_dir(&self) -> PathBuf {
        self.config.migration_dir_absolute(&self.root)
    }
}

/// Load the project configuration from `--config` or the project directory.
pub(crate) fn load_project(global: &GlobalArgs) -> Result<Project> {
    let config = match &global.config {
        Some(path) => Config::load(path),
        None => Config::load_from_dir(&global.project_dir),
    }
    .context("Failed to load project config")?;
    Ok(Project {
        root: global.project_dir.clone(),
        config,
    })
}

/// Parse every migration in the project's migration directory.
///
/// All parse failures are reported together.
pub(crate) fn load_catalog(project: &Project) -> Result<Catalog> {
    let source = DirectorySource::new(project.migration_dir());
    let catalog = load(&source)
        .and_then(|outcome| outcome.into_catalog())
        .with_context(|| format!("Failed to load migrations from {}", source.dir().display()))?;
    Ok(catalog)
}

/// Open the driver for the selected target.
pub(crate) fn open_driver(project: &Project, global: &GlobalArgs) -> Result<DuckDbDriver> {
    let db_config = project
        .config
        .get_database_config(global.target.as_deref())?;
    log::debug!("Connecting to {} database at {}", db_config.db_type, db_config.path);
    DuckDbDriver::from_config(&db_config, &project.config.version_table)
        .with_context(|| format!("Failed to open database {}", db_config.path))
}

/// A token cancelled when the process receives Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received, stopping after the current migration...");
            trigger.cancel();
        }
    });
    token
}

/// Print a plan, one line per migration.
pub(crate) fn print_plan(planned: &[PlannedMigration<'_>]) {
    for item in planned {
        let arrow = match item.direction {
            Direction::Up => "↑",
            Direction::Down => "↓",
        };
        println!("  {} {} ({})", arrow, item.id(), item.direction);
    }
}

/// Plan towards `target` and execute it, or only print it on a dry run.
///
/// The driver is closed on every path.
pub(crate) async fn run_target(global: &GlobalArgs, target: Target, dry_run: bool) -> Result<()> {
    let project = load_project(global)?;
    let catalog = load_catalog(&project)?;
    let driver = open_driver(&project, global)?;

    let result = plan_and_run(&driver, &catalog, target, dry_run).await;
    let closed = driver.close().await.context("Failed to close database");
    result.and(closed)
}

async fn plan_and_run(
    driver: &DuckDbDriver,
    catalog: &Catalog,
    target: Target,
    dry_run: bool,
) -> Result<()> {
    let applied = driver
        .versions()
        .await
        .context("Failed to read applied migrations")?;
    let planned = plan(catalog, &applied, target)?;

    if planned.is_empty() {
        println!("Nothing to do: database is up to date.");
        return Ok(());
    }

    if dry_run {
        println!("Dry run - would run {} migration(s):", planned.len());
        print_plan(&planned);
        return Ok(());
    }

    println!("Running {} migration(s):", planned.len());
    print_plan(&planned);
    let completed = tm_core::execute(driver, &planned, &cancel_on_ctrl_c()).await?;
    println!();
    println!("Completed {} migration(s)", completed);
    Ok(())
}
