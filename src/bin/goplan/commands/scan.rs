//! `goplan scan` command

use anyhow::Result;

use super::load_workspace;
use crate::cli::{GlobalArgs, ScanArgs};
use goplan::builder::BuildContext;
use goplan::ops::goplan_build::scan;

pub fn execute(args: ScanArgs, global: &GlobalArgs) -> Result<()> {
    let ws = load_workspace(global)?;
    let ctx = BuildContext::new(&ws, false)?;

    let units = scan(&ws, &ctx, &args.unit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&units)?);
        return Ok(());
    }

    for unit in &units {
        println!("{}", unit.unit);
        for (name, package) in &unit.packages {
            let deps: Vec<&str> = package.dependencies.iter().map(String::as_str).collect();
            println!(
                "  {} ({} file(s)) imports [{}] depends on [{}]",
                name,
                package.files.len(),
                package.imports.join(", "),
                deps.join(", ")
            );
        }
    }

    Ok(())
}
