//! Publishing unit outputs after a successful build.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::plan::{BuildGraph, PlannedUnit};
use crate::core::unit::UnitDecl;
use crate::util::config::GoEnv;
use crate::util::fs::copy_with_mode;

/// Where a unit's output would be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub mode: u32,
}

/// Copies each unit's final artifact to its install directory.
#[derive(Debug)]
pub struct InstallPublisher<'a> {
    env: &'a GoEnv,
}

impl<'a> InstallPublisher<'a> {
    pub fn new(env: &'a GoEnv) -> Self {
        InstallPublisher { env }
    }

    /// Compute the install copies for a unit without touching the
    /// filesystem.
    ///
    /// Empty when installation is disabled or the unit has no output.
    pub fn targets(
        &self,
        unit: &UnitDecl,
        planned: &PlannedUnit,
        graph: &BuildGraph,
    ) -> Vec<InstallTarget> {
        let Some(dir) = unit.install_dir(self.env) else {
            return Vec::new();
        };

        planned
            .install_outputs(graph)
            .into_iter()
            .filter_map(|source| {
                Some(InstallTarget {
                    source: source.to_path_buf(),
                    destination: dir.join(source.file_name()?),
                    mode: unit.file_mode(),
                })
            })
            .collect()
    }

    /// Install a unit's outputs. Returns the installed paths.
    pub fn publish(
        &self,
        unit: &UnitDecl,
        planned: &PlannedUnit,
        graph: &BuildGraph,
    ) -> Result<Vec<PathBuf>> {
        let targets = self.targets(unit, planned, graph);
        if targets.is_empty() {
            tracing::debug!("{}: nothing to install", unit.name);
        }

        let mut installed = Vec::with_capacity(targets.len());
        for target in targets {
            copy_with_mode(&target.source, &target.destination, target.mode)?;
            tracing::info!(
                "installed {} ({:o})",
                target.destination.display(),
                target.mode
            );
            installed.push(target.destination);
        }

        Ok(installed)
    }
}
