//! Command implementations

pub mod build;
pub mod clean;
pub mod scan;

use anyhow::Result;

use crate::cli::GlobalArgs;
use goplan::core::Workspace;

/// Load the workspace named by `--manifest-path`, or the nearest one.
pub fn load_workspace(global: &GlobalArgs) -> Result<Workspace> {
    match &global.manifest_path {
        Some(path) => Workspace::new(path),
        None => Workspace::discover(&std::env::current_dir()?),
    }
}
