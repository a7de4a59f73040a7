//! Source file handles.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::fs::relative_path;

/// A source file declared by a build unit.
///
/// Holds the path on disk and the path relative to the workspace root, which
/// is what gets shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceFile {
    path: PathBuf,
    rel_path: PathBuf,
}

impl SourceFile {
    /// Create a handle for `path`, relative to the workspace `root`.
    pub fn new(root: &Path, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let rel_path = relative_path(root, &path);
        SourceFile { path, rel_path }
    }

    /// Path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the workspace root.
    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rel_path.display())
    }
}
