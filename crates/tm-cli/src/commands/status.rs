//! Status command implementation

use anyhow::{Context, Result};
use tm_core::{status, Driver, StatusReport};

use crate::cli::{GlobalArgs, StatusArgs, StatusOutput};
use crate::commands::common::{load_catalog, load_project, open_driver};

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let catalog = load_catalog(&project)?;
    let driver = open_driver(&project, global)?;

    let applied = driver.versions().await;
    driver.close().await.context("Failed to close database")?;
    let applied = applied.context("Failed to read applied migrations")?;

    let report = status(&catalog, &applied);
    match args.output {
        StatusOutput::Table => print_table(&report),
        StatusOutput::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn print_table(report: &StatusReport) {
    let width = report
        .migrations
        .iter()
        .map(|m| m.id.len())
        .chain(report.unknown.iter().map(|id| id.len()))
        .max()
        .unwrap_or(0)
        .max("Migration".len());

    println!("{:<width$}  {:<7}  Reversible", "Migration", "Applied");
    println!("{}", "-".repeat(width + 21));
    for m in &report.migrations {
        println!(
            "{:<width$}  {:<7}  {}",
            m.id,
            yes_no(m.applied),
            yes_no(m.reversible)
        );
    }
    for id in &report.unknown {
        println!("{:<width$}  {:<7}  (not in catalog)", id, "yes");
    }

    println!();
    println!(
        "{} applied, {} pending",
        report.applied_count(),
        report.pending_count()
    );
    if report.has_drift() {
        log::warn!(
            "{} applied migration(s) are missing from the migration directory; up/down will refuse to run",
            report.unknown.len()
        );
    }
}
