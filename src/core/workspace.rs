//! Workspace - central configuration hub.
//!
//! A Workspace is the directory holding `Goplan.toml`, with the declared
//! units and the paths derived from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::manifest::{find_manifest, Manifest};
use crate::core::unit::UnitDecl;

/// A workspace: the manifest and its root directory.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    manifest: Manifest,
    build_dir: PathBuf,
}

impl Workspace {
    /// Create a new workspace from a manifest path.
    pub fn new(manifest_path: &Path) -> Result<Self> {
        let manifest = Manifest::load(manifest_path)?;
        let root = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        Ok(Self::from_manifest(root, manifest))
    }

    /// Locate the manifest from `cwd` upwards and load it.
    pub fn discover(cwd: &Path) -> Result<Self> {
        let manifest_path = find_manifest(cwd)?;
        Self::new(&manifest_path)
            .with_context(|| format!("failed to load workspace at {}", manifest_path.display()))
    }

    /// Create a workspace from an already parsed manifest.
    pub fn from_manifest(root: PathBuf, manifest: Manifest) -> Self {
        // Default build directory is .goplan/build in the workspace root
        let build_dir = root.join(".goplan").join("build");

        Workspace {
            root,
            manifest,
            build_dir,
        }
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Get the build directory.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Output directory of one unit.
    pub fn unit_dir(&self, name: &str) -> PathBuf {
        self.build_dir.join(name)
    }

    /// Find a unit by name.
    pub fn unit(&self, name: &str) -> Option<&UnitDecl> {
        self.manifest.unit(name)
    }

    /// All declared units, in manifest order.
    pub fn units(&self) -> &[UnitDecl] {
        &self.manifest.units
    }

    /// Names of all declared units.
    pub fn unit_names(&self) -> Vec<&str> {
        self.manifest.units.iter().map(|u| u.name.as_str()).collect()
    }

    /// Registered external libraries, with relative paths resolved against
    /// the workspace root.
    pub fn libraries(&self) -> BTreeMap<String, PathBuf> {
        self.manifest
            .libraries
            .iter()
            .map(|(name, path)| (name.clone(), self.root.join(path)))
            .collect()
    }

    /// Select units by name; an empty filter selects every unit.
    pub fn select_units(&self, filter: &[String]) -> Result<Vec<&UnitDecl>> {
        if filter.is_empty() {
            return Ok(self.manifest.units.iter().collect());
        }

        let mut units = Vec::new();
        for name in filter {
            match self.unit(name) {
                Some(unit) => units.push(unit),
                None => {
                    let names = self.unit_names();
                    bail!(
                        "unit `{}` not found in workspace\n\
                         available units: {}",
                        name,
                        if names.is_empty() {
                            "(none)".to_string()
                        } else {
                            names.join(", ")
                        }
                    );
                }
            }
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::MANIFEST_NAME;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[libraries]
sqlite = "vendor/sqlite"
abs = "/opt/abs"

[[unit]]
kind = "package"
target = "foo"
source = ["foo.go"]

[[unit]]
target = "bar"
source = ["bar.go"]
usepkg-local = ["foo"]
"#;

    fn workspace() -> (TempDir, Workspace) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), MANIFEST).unwrap();
        std::fs::create_dir_all(tmp.path().join("sub/dir")).unwrap();

        let ws = Workspace::discover(&tmp.path().join("sub/dir")).unwrap();
        (tmp, ws)
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let (tmp, ws) = workspace();

        assert_eq!(ws.root(), tmp.path());
        assert_eq!(ws.build_dir(), tmp.path().join(".goplan/build"));
        assert_eq!(ws.unit_dir("foo"), tmp.path().join(".goplan/build/foo"));
        assert_eq!(ws.unit_names(), vec!["foo", "bar"]);
    }

    #[test]
    fn test_libraries_resolve_against_root() {
        let (tmp, ws) = workspace();
        let libs = ws.libraries();

        assert_eq!(libs["sqlite"], tmp.path().join("vendor/sqlite"));
        assert_eq!(libs["abs"], PathBuf::from("/opt/abs"));
    }

    #[test]
    fn test_select_units() {
        let (_tmp, ws) = workspace();

        assert_eq!(ws.select_units(&[]).unwrap().len(), 2);

        let selected = ws.select_units(&["bar".to_string()]).unwrap();
        assert_eq!(selected[0].name, "bar");

        let err = ws.select_units(&["baz".to_string()]).unwrap_err().to_string();
        assert!(err.contains("unit `baz` not found"));
        assert!(err.contains("available units: foo, bar"));
    }
}
