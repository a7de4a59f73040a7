//! Implementation of `goplan clean`.

use anyhow::Result;

use crate::core::Workspace;
use crate::util::fs::remove_dir_all_if_exists;

/// Remove the build directory. Returns whether there was anything to remove.
pub fn clean(ws: &Workspace) -> Result<bool> {
    let build_dir = ws.build_dir();
    if !build_dir.exists() {
        return Ok(false);
    }

    remove_dir_all_if_exists(build_dir)?;
    tracing::info!("removed {}", build_dir.display());
    Ok(true)
}
