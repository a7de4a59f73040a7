//! Toolchain abstraction for the gc compiler family.
//!
//! Commands are rendered from structured inputs at execution time, so the
//! planner and the cross-unit linker can keep adjusting search paths after
//! a task has been created.
//!
//! Program lookup priority:
//! 1. Explicit paths in the `[toolchain]` table (`gc`, `ld`, `pack`, `fmt`)
//! 2. `$GOROOT/bin`
//! 3. `PATH`

use std::path::{Path, PathBuf};

use crate::core::unit::FormatMode;

mod detect;
mod gc;

pub use detect::detect_toolchain;
pub use gc::GcToolchain;

/// A rendered toolchain invocation.
///
/// This is what `build --plan` prints and what the executor spawns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Exported on top of the inherited environment
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: vec![],
            env: vec![],
        }
    }

    pub fn arg(self, arg: impl Into<String>) -> Self {
        self.args(std::iter::once(arg))
    }

    pub fn args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Program and arguments joined by spaces.
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Sources of one package
    pub sources: Vec<PathBuf>,
    pub output: PathBuf,
    /// Import search directories
    pub include_dirs: Vec<PathBuf>,
}

/// Input for a link step.
#[derive(Debug, Clone)]
pub struct LinkInput {
    /// Objects to link (the `main` package's object)
    pub objects: Vec<PathBuf>,
    /// Output executable
    pub output: PathBuf,
    /// Library search directories
    pub lib_dirs: Vec<PathBuf>,
}

/// Input for an archive step.
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    /// Objects to archive
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Renders gc-family commands from step inputs.
pub trait Toolchain: Send + Sync {
    /// Path of the formatter, also used by the scanner's `gofmt` mode.
    fn formatter_path(&self) -> &Path;

    /// `-I` per include dir, then `-o`, then the sources.
    fn compile_command(&self, input: &CompileInput) -> CommandSpec;

    /// `-L` per library dir, then `-o`, then the objects.
    fn link_command(&self, input: &LinkInput) -> CommandSpec;

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec;

    /// Generate a formatter command over `files`.
    fn format_command(&self, files: &[PathBuf], mode: FormatMode) -> CommandSpec;

    /// Extension of compiled objects (e.g. `.6`).
    fn object_extension(&self) -> &str;

    /// Extension of package archives.
    fn archive_extension(&self) -> &str;
}
