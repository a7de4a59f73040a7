//! `goplan build` command

use anyhow::Result;

use super::load_workspace;
use crate::cli::{BuildArgs, GlobalArgs};
use goplan::builder::BuildContext;
use goplan::core::FormatMode;
use goplan::ops::goplan_build::{build, BuildOptions};

pub fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let ws = load_workspace(global)?;

    let format = if args.gofmt_list {
        Some(FormatMode::List)
    } else if args.gofmt {
        Some(FormatMode::Write)
    } else {
        None
    };

    // --plan only renders commands, so the programs need not exist
    let ctx = BuildContext::new(&ws, !args.plan)?.with_format_request(format);

    let opts = BuildOptions {
        units: args.unit,
        emit_plan: args.plan,
        install: args.install,
        format,
        jobs: args.jobs,
        verbose: global.verbose,
    };

    let result = build(&ws, &ctx, &opts)?;

    if !args.plan {
        for artifact in &result.artifacts {
            eprintln!(
                "    Finished `{}` -> {}",
                artifact.unit,
                artifact.path.display()
            );
        }
        for path in &result.installed {
            eprintln!("   Installed {}", path.display());
        }
    }

    Ok(())
}
