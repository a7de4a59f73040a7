//! Build unit declarations.
//!
//! A build unit is one `[[unit]]` entry of `Goplan.toml`: an executable
//! program or a set of library packages, with its sources and the other
//! units and libraries it uses.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::config::GoEnv;

/// What a unit produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// An executable linked from the `main` package
    #[default]
    Program,
    /// One archive per package
    Package,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Program => "program",
            UnitKind::Package => "package",
        }
    }

    /// File mode used when installing the unit's output.
    pub fn default_mode(&self) -> u32 {
        match self {
            UnitKind::Program => 0o755,
            UnitKind::Package => 0o644,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formatter pre-pass mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatMode {
    /// Rewrite files in place (`gofmt -w`)
    Write,
    /// Only list files whose formatting differs (`gofmt -l`)
    List,
}

/// A declared build unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitDecl {
    /// Unit name used by `usepkg-local` references (defaults to `target`)
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub kind: UnitKind,

    /// Output base name
    pub target: String,

    /// Source files or glob patterns, relative to the workspace root
    #[serde(default)]
    pub source: Vec<String>,

    /// Sibling units this unit depends on
    #[serde(default)]
    pub usepkg_local: Vec<String>,

    /// External libraries registered in `[libraries]`
    #[serde(default)]
    pub usepkg: Vec<String>,

    /// Run the formatter over the sources before compiling
    #[serde(default)]
    pub format: bool,

    /// List badly formatted sources instead of rewriting them
    #[serde(default)]
    pub format_list: bool,

    /// Install directory; `${PREFIX}` and friends are expanded, empty disables
    #[serde(default)]
    pub install_path: Option<String>,

    /// Install file mode (defaults per kind)
    #[serde(default)]
    pub chmod: Option<u32>,
}

impl UnitDecl {
    /// Create a unit with default settings.
    pub fn new(name: impl Into<String>, kind: UnitKind, target: impl Into<String>) -> Self {
        UnitDecl {
            name: name.into(),
            kind,
            target: target.into(),
            source: Vec::new(),
            usepkg_local: Vec::new(),
            usepkg: Vec::new(),
            format: false,
            format_list: false,
            install_path: None,
            chmod: None,
        }
    }

    /// Set the sibling units this unit depends on.
    pub fn with_local_deps<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.usepkg_local = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the install path.
    pub fn with_install_path(mut self, path: impl Into<String>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    /// Effective formatter mode, given the command-line request.
    ///
    /// Listing wins when either side asks for it, unless the command line
    /// explicitly asked for rewriting.
    pub fn format_mode(&self, requested: Option<FormatMode>) -> Option<FormatMode> {
        if requested.is_none() && !self.format && !self.format_list {
            return None;
        }

        let list = (requested == Some(FormatMode::List) || self.format_list)
            && requested != Some(FormatMode::Write);

        Some(if list {
            FormatMode::List
        } else {
            FormatMode::Write
        })
    }

    /// Directory the unit's output is installed into, if any.
    pub fn install_dir(&self, env: &GoEnv) -> Option<PathBuf> {
        match self.install_path.as_deref() {
            Some("") => None,
            Some(path) => Some(env.expand(path)),
            None => Some(match self.kind {
                UnitKind::Program => env.bin_install_dir(),
                UnitKind::Package => env.pkg_install_dir(),
            }),
        }
    }

    /// File mode for the installed output.
    pub fn file_mode(&self) -> u32 {
        self.chmod.unwrap_or_else(|| self.kind.default_mode())
    }
}
