//! Down command implementation

use anyhow::{bail, Result};
use tm_core::Target;

use crate::cli::{DownArgs, GlobalArgs};
use crate::commands::common::run_target;

/// Execute the down command
pub async fn execute(args: &DownArgs, global: &GlobalArgs) -> Result<()> {
    if args.steps == 0 {
        bail!("--steps must be at least 1");
    }
    run_target(global, Target::Rollback(args.steps), args.dry_run).await
}
