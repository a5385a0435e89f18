use anyhow::Result;

use crate::cli::commands::CheckPlanArgs;
use crate::config;

/// Parse and validate a site plan file. Exit code 0 when usable.
pub fn cmd_check_plan(args: &CheckPlanArgs) -> Result<i32> {
    let plan = config::load_plan(&args.plan)?;
    match plan.validate() {
        Ok(()) => {
            println!(
                "plan '{}' is valid ({} login surface)",
                plan.name,
                if plan.is_multi_surface() {
                    "multi"
                } else {
                    "single"
                }
            );
            Ok(0)
        }
        Err(err) => {
            eprintln!("plan '{}' is invalid: {err}", plan.name);
            Ok(1)
        }
    }
}
