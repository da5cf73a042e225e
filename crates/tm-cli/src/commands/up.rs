//! Up command implementation

use anyhow::Result;
use tm_core::Target;

use crate::cli::{GlobalArgs, UpArgs};
use crate::commands::common::run_target;

/// Execute the up command
pub async fn execute(args: &UpArgs, global: &GlobalArgs) -> Result<()> {
    let target = match args.limit {
        Some(limit) => Target::ApplyNext(limit),
        None => Target::ApplyPending,
    };
    run_target(global, target, args.dry_run).await
}
