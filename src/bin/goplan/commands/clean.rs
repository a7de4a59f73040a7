//! `goplan clean` command

use anyhow::Result;

use super::load_workspace;
use crate::cli::{CleanArgs, GlobalArgs};
use goplan::ops::clean;

pub fn execute(_args: CleanArgs, global: &GlobalArgs) -> Result<()> {
    let ws = load_workspace(global)?;

    if clean(&ws)? {
        eprintln!("     Removed {}", ws.build_dir().display());
    }

    Ok(())
}
