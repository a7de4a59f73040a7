//! Build context - toolchain, environment, and output paths.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::builder::plan::BuildGraphPlanner;
use crate::builder::toolchain::{detect_toolchain, GcToolchain, Toolchain};
use crate::core::unit::FormatMode;
use crate::core::Workspace;
use crate::scanner::{Normalizer, SourceScanner};
use crate::util::config::{GoEnv, ScannerKind};

/// Everything needed to plan and run units of one workspace.
#[derive(Clone)]
pub struct BuildContext {
    /// Validated Go environment
    pub env: GoEnv,

    /// Toolchain implementation
    pub toolchain: Arc<dyn Toolchain>,

    /// Source scanner
    pub scanner: SourceScanner,

    /// External library name -> search directory
    pub libraries: BTreeMap<String, PathBuf>,

    /// Output directory; each unit gets a subdirectory
    pub build_dir: PathBuf,

    /// Workspace root
    pub workspace_root: PathBuf,

    /// Formatter mode requested on the command line
    pub format_request: Option<FormatMode>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("env", &self.env)
            .field("toolchain", &self.toolchain.formatter_path())
            .field("scanner", &self.scanner)
            .field("libraries", &self.libraries)
            .field("build_dir", &self.build_dir)
            .field("workspace_root", &self.workspace_root)
            .field("format_request", &self.format_request)
            .finish()
    }
}

impl BuildContext {
    /// Create a build context from a workspace.
    ///
    /// The environment is validated first. With `locate_programs` the
    /// toolchain programs must exist; without it they are referred to by
    /// name, which is enough to render commands.
    pub fn new(ws: &Workspace, locate_programs: bool) -> Result<Self> {
        let settings = &ws.manifest().toolchain;
        let env = GoEnv::resolve(settings)?;

        let toolchain = if locate_programs || settings.scanner == ScannerKind::Gofmt {
            detect_toolchain(&env, settings)?
        } else {
            GcToolchain::unresolved(&env, settings)
        };

        Ok(Self::with_toolchain(ws, env, Arc::new(toolchain)))
    }

    /// Create a build context around an existing toolchain.
    pub fn with_toolchain(ws: &Workspace, env: GoEnv, toolchain: Arc<dyn Toolchain>) -> Self {
        let scanner = match ws.manifest().toolchain.scanner {
            ScannerKind::Builtin => SourceScanner::builtin(),
            ScannerKind::Gofmt => SourceScanner::new(Normalizer::Formatter(
                toolchain.formatter_path().to_path_buf(),
            )),
        };

        BuildContext {
            env,
            toolchain,
            scanner,
            libraries: ws.libraries(),
            build_dir: ws.build_dir().to_path_buf(),
            workspace_root: ws.root().to_path_buf(),
            format_request: None,
        }
    }

    /// Set the formatter mode requested on the command line.
    pub fn with_format_request(mut self, mode: Option<FormatMode>) -> Self {
        self.format_request = mode;
        self
    }

    /// Output directory of one unit.
    pub fn unit_dir(&self, name: &str) -> PathBuf {
        self.build_dir.join(name)
    }

    /// Workspace root.
    pub fn root(&self) -> &Path {
        &self.workspace_root
    }

    /// A planner using this toolchain's file extensions.
    pub fn planner(&self) -> BuildGraphPlanner {
        BuildGraphPlanner::new(
            self.toolchain.object_extension(),
            self.toolchain.archive_extension(),
        )
    }
}
