//! Toolchain configuration and environment validation.
//!
//! The `[toolchain]` table of `Goplan.toml` may pin the Go environment:
//!
//! ```toml
//! [toolchain]
//! goroot = "/usr/local/go"
//! goos = "linux"
//! goarch = "amd64"
//! ```
//!
//! Any value left out is taken from the process environment (`GOROOT`,
//! `GOOS`, `GOARCH`). Every problem is collected and reported at once,
//! before a single build unit is looked at.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// Operating systems the toolchain can target.
pub const SUPPORTED_OS: &[&str] = &["darwin", "linux", "nacl"];

/// Architectures the toolchain can target.
pub const SUPPORTED_ARCH: &[&str] = &["amd64", "386", "arm"];

/// Error in the toolchain configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not set")]
    MissingVar { var: &'static str },

    #[error("{var} is set to `{value}`, must be one of {}", .allowed.join(", "))]
    InvalidValue {
        var: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("required program `{program}` was not found (searched {searched})")]
    ProgramNotFound { program: String, searched: String },

    #[error("invalid toolchain configuration: {}", render_all(.0))]
    Multiple(Vec<ConfigError>),
}

fn render_all(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    /// Collapse a list of problems into a single error.
    pub(crate) fn from_problems(mut problems: Vec<ConfigError>) -> Self {
        if problems.len() == 1 {
            problems.remove(0)
        } else {
            ConfigError::Multiple(problems)
        }
    }

    /// Number of individual problems carried by this error.
    pub fn problem_count(&self) -> usize {
        match self {
            ConfigError::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error("invalid toolchain configuration");
        match self {
            ConfigError::Multiple(errors) => {
                for e in errors {
                    diag = diag.with_context(e.to_string());
                }
            }
            other => diag = diag.with_context(other.to_string()),
        }
        diag.with_suggestion("Set GOROOT, GOOS and GOARCH in the environment")
            .with_suggestion("Or pin them in the [toolchain] table of Goplan.toml")
    }
}

/// Target operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoOs {
    Darwin,
    Linux,
    Nacl,
}

impl GoOs {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "darwin" => Some(GoOs::Darwin),
            "linux" => Some(GoOs::Linux),
            "nacl" => Some(GoOs::Nacl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoOs::Darwin => "darwin",
            GoOs::Linux => "linux",
            GoOs::Nacl => "nacl",
        }
    }
}

impl fmt::Display for GoOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoArch {
    #[serde(rename = "amd64")]
    Amd64,
    #[serde(rename = "386")]
    I386,
    #[serde(rename = "arm")]
    Arm,
}

impl GoArch {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "amd64" => Some(GoArch::Amd64),
            "386" => Some(GoArch::I386),
            "arm" => Some(GoArch::Arm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoArch::Amd64 => "amd64",
            GoArch::I386 => "386",
            GoArch::Arm => "arm",
        }
    }

    /// Single-letter toolchain prefix (`6g`, `8l`, `5g`, ...).
    pub fn letter(&self) -> char {
        match self {
            GoArch::Amd64 => '6',
            GoArch::I386 => '8',
            GoArch::Arm => '5',
        }
    }
}

impl fmt::Display for GoArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How source files are normalized before package/import extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    /// Strip comments in-process
    #[default]
    Builtin,
    /// Run `gofmt -comments=false` and read its output
    Gofmt,
}

/// The `[toolchain]` table of the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolchainSettings {
    /// Toolchain root directory
    pub goroot: Option<PathBuf>,

    /// Target operating system
    pub goos: Option<String>,

    /// Target architecture
    pub goarch: Option<String>,

    /// Install prefix used for `${PREFIX}` (default `/usr/local`)
    pub prefix: Option<PathBuf>,

    /// Source normalizer for the scanner
    pub scanner: ScannerKind,

    /// Compiler override
    pub gc: Option<PathBuf>,

    /// Linker override
    pub ld: Option<PathBuf>,

    /// Archiver override
    pub pack: Option<PathBuf>,

    /// Formatter override
    pub fmt: Option<PathBuf>,

    /// Extra compiler flags for every unit
    pub goflags: Vec<String>,

    /// Extra linker flags for every unit
    pub goldflags: Vec<String>,
}

/// A validated Go environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoEnv {
    pub goroot: PathBuf,
    pub goos: GoOs,
    pub goarch: GoArch,
    pub prefix: PathBuf,
}

impl GoEnv {
    /// Resolve the environment from the manifest settings and the process
    /// environment.
    pub fn resolve(settings: &ToolchainSettings) -> Result<Self, ConfigError> {
        Self::resolve_with(settings, |var| std::env::var(var).ok())
    }

    /// Resolve the environment using `lookup` in place of the process
    /// environment.
    pub fn resolve_with<F>(settings: &ToolchainSettings, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();

        let goroot = settings
            .goroot
            .clone()
            .or_else(|| non_empty(lookup("GOROOT")).map(PathBuf::from));
        if goroot.is_none() {
            problems.push(ConfigError::MissingVar { var: "GOROOT" });
        }

        let goos = pick(
            "GOOS",
            settings.goos.as_deref(),
            &lookup,
            SUPPORTED_OS,
            GoOs::parse,
            &mut problems,
        );
        let goarch = pick(
            "GOARCH",
            settings.goarch.as_deref(),
            &lookup,
            SUPPORTED_ARCH,
            GoArch::parse,
            &mut problems,
        );

        match (goroot, goos, goarch) {
            (Some(goroot), Some(goos), Some(goarch)) if problems.is_empty() => {
                let prefix = settings
                    .prefix
                    .clone()
                    .or_else(|| non_empty(lookup("PREFIX")).map(PathBuf::from))
                    .unwrap_or_else(|| PathBuf::from("/usr/local"));

                tracing::debug!("go environment: {} {}/{}", goroot.display(), goos, goarch);

                Ok(GoEnv {
                    goroot,
                    goos,
                    goarch,
                    prefix,
                })
            }
            _ => Err(ConfigError::from_problems(problems)),
        }
    }

    /// Extension of compiled objects, e.g. `.6`.
    pub fn object_ext(&self) -> String {
        format!(".{}", self.goarch.letter())
    }

    /// Extension of package archives.
    pub fn archive_ext(&self) -> &'static str {
        ".a"
    }

    /// `$GOROOT/bin`.
    pub fn bin_dir(&self) -> PathBuf {
        self.goroot.join("bin")
    }

    /// Default install directory for packages: `$GOROOT/pkg/$GOOS_$GOARCH`.
    pub fn pkg_install_dir(&self) -> PathBuf {
        self.goroot
            .join("pkg")
            .join(format!("{}_{}", self.goos, self.goarch))
    }

    /// Default install directory for programs: `${PREFIX}/bin`.
    pub fn bin_install_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// Expand `${PREFIX}`, `${GOROOT}`, `${GOOS}` and `${GOARCH}` in a path.
    pub fn expand(&self, path: &str) -> PathBuf {
        let expanded = path
            .replace("${PREFIX}", &self.prefix.to_string_lossy())
            .replace("${GOROOT}", &self.goroot.to_string_lossy())
            .replace("${GOOS}", self.goos.as_str())
            .replace("${GOARCH}", self.goarch.as_str());
        PathBuf::from(expanded)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Pick a value from the manifest or the environment and validate it.
fn pick<T, F>(
    var: &'static str,
    configured: Option<&str>,
    lookup: &F,
    allowed: &'static [&'static str],
    parse: fn(&str) -> Option<T>,
    problems: &mut Vec<ConfigError>,
) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match configured {
        Some(v) => Some(v.to_string()),
        None => non_empty(lookup(var)),
    };

    let Some(value) = value else {
        problems.push(ConfigError::MissingVar { var });
        return None;
    };

    match parse(value.trim()) {
        Some(parsed) => Some(parsed),
        None => {
            problems.push(ConfigError::InvalidValue {
                var,
                value,
                allowed,
            });
            None
        }
    }
}
