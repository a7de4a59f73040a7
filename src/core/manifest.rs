//! Goplan.toml manifest parsing and schema.
//!
//! The manifest declares the toolchain settings, the external libraries a
//! unit may `usepkg`, and the build units themselves.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::unit::UnitDecl;
use crate::util::config::ToolchainSettings;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Goplan.toml";

/// Error while locating or loading the manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `{}` in `{}` or any parent directory", MANIFEST_NAME, .dir.display())]
    NotFound { dir: PathBuf },

    #[error("failed to read manifest `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest `{}`", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid manifest `{}`: {message}", .path.display())]
    Invalid { path: PathBuf, message: String },
}

impl ManifestError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ManifestError::NotFound { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(suggestions::NO_MANIFEST)
                .with_suggestion("Or pass --manifest-path"),
            ManifestError::Read { path, source } => Diagnostic::error(self.to_string())
                .with_location(path)
                .with_context(source.to_string()),
            ManifestError::Parse { path, source } => Diagnostic::error(self.to_string())
                .with_location(path)
                .with_context(source.message().to_string()),
            ManifestError::Invalid { path, .. } => {
                Diagnostic::error(self.to_string()).with_location(path)
            }
        }
    }
}

/// The parsed manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Toolchain settings
    pub toolchain: ToolchainSettings,

    /// External library name -> registered output directory
    pub libraries: BTreeMap<String, PathBuf>,

    /// Declared build units
    #[serde(rename = "unit")]
    pub units: Vec<UnitDecl>,
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Parse and validate manifest contents; `path` is used for messages.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ManifestError> {
        let mut manifest: Manifest =
            toml::from_str(contents).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Fill unit names from targets and check names are usable.
    fn validate(&mut self, path: &Path) -> Result<(), ManifestError> {
        let invalid = |message: String| ManifestError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        let mut seen = HashSet::new();
        for unit in &mut self.units {
            if unit.target.trim().is_empty() {
                return Err(invalid("every [[unit]] needs a non-empty `target`".to_string()));
            }
            if unit.name.is_empty() {
                unit.name = unit.target.clone();
            }
            if !seen.insert(unit.name.clone()) {
                return Err(invalid(format!("unit `{}` is declared twice", unit.name)));
            }
            if unit.source.is_empty() {
                tracing::warn!("unit `{}` declares no sources", unit.name);
            }
        }

        Ok(())
    }

    /// Find a unit by name.
    pub fn unit(&self, name: &str) -> Option<&UnitDecl> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// Find the manifest in `dir` or any of its parents.
pub fn find_manifest(dir: &Path) -> Result<PathBuf, ManifestError> {
    let mut current = dir.to_path_buf();
    loop {
        let candidate = current.join(MANIFEST_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(ManifestError::NotFound {
                dir: dir.to_path_buf(),
            });
        }
    }
}
