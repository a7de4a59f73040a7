//! Package and import discovery.
//!
//! Each source file is normalized (see [`normalize`]) and then matched
//! against a handful of patterns to recover its package clause and the
//! packages it imports. This is a heuristic, not a parser: matching is
//! limited to the header before the first top-level declaration, which is
//! where the language puts both clauses.

pub mod normalize;

use std::path::PathBuf;
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;

use crate::core::source::SourceFile;
use crate::util::diagnostic::Diagnostic;

pub use normalize::Normalizer;

static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|;)[ \t]*package[ \t]+([\p{L}_][\p{L}\p{N}_]*)").unwrap()
});

static IMPORT_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(?:^|;)\s*import\s*(?:(?:[\p{L}_][\p{L}\p{N}_]*|\.)\s*)?(?:"([^"\n]*)"|`([^`]*)`)"#)
        .unwrap()
});

static IMPORT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)(?:^|;)\s*import\s*\(([^)]*)\)").unwrap());

/// One entry of an import block; a leading alias, `.` or `_` is skipped.
static IMPORT_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:(?:[\p{L}_][\p{L}\p{N}_]*|\.)\s*)?(?:"([^"\n]*)"|`([^`]*)`)\s*;?"#).unwrap()
});

/// Error while scanning a source file.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no package clause in `{}`", .path.display())]
    NoPackageClause { path: PathBuf },

    #[error("failed to read `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("formatter failed on `{}`: {message}", .path.display())]
    Formatter { path: PathBuf, message: String },
}

impl ScanError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ScanError::NoPackageClause { path } => Diagnostic::error("missing package clause")
                .with_location(path)
                .with_suggestion("Start the file with `package <name>`"),
            ScanError::Read { path, source } => Diagnostic::error("cannot read source file")
                .with_location(path)
                .with_context(source.to_string())
                .with_suggestion("Check the `source` list of the unit in Goplan.toml"),
            ScanError::Formatter { path, message } => Diagnostic::error("gofmt rejected the file")
                .with_location(path)
                .with_context(message.clone())
                .with_suggestion("Fix the syntax error, or set scanner = \"builtin\""),
        }
    }
}

/// Package clause and imports of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUnit {
    pub package: String,

    /// Base names of the imported paths, in source order
    pub imports: Vec<String>,
}

/// The conventional package name of an import path: its last segment.
pub fn import_base_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// Extract the package clause and imports from normalized source text.
///
/// Returns `None` when the text has no package clause.
pub fn parse_source(text: &str) -> Option<ParsedUnit> {
    let head = normalize::header(text);

    let package = PACKAGE_RE.captures(head)?.get(1)?.as_str().to_string();

    let mut found: Vec<(usize, &str)> = Vec::new();

    for cap in IMPORT_SINGLE_RE.captures_iter(head) {
        if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
            found.push((m.start(), m.as_str()));
        }
    }

    for block in IMPORT_BLOCK_RE.captures_iter(head) {
        let Some(body) = block.get(1) else {
            continue;
        };
        for entry in IMPORT_ENTRY_RE.captures_iter(body.as_str()) {
            if let Some(m) = entry.get(1).or_else(|| entry.get(2)) {
                found.push((body.start() + m.start(), m.as_str()));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);

    let imports = found
        .into_iter()
        .map(|(_, path)| import_base_name(path))
        .filter(|name| !name.is_empty() && *name != ".")
        .map(str::to_string)
        .collect();

    Some(ParsedUnit { package, imports })
}

/// Scans source files into [`ParsedUnit`]s.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    normalizer: Normalizer,
}

impl SourceScanner {
    pub fn new(normalizer: Normalizer) -> Self {
        SourceScanner { normalizer }
    }

    /// A scanner that strips comments in-process.
    pub fn builtin() -> Self {
        Self::new(Normalizer::Builtin)
    }

    /// Scan one file.
    pub fn scan(&self, file: &SourceFile) -> Result<ParsedUnit, ScanError> {
        let text = self.normalizer.normalize(file.path())?;
        let parsed = parse_source(&text).ok_or_else(|| ScanError::NoPackageClause {
            path: file.rel_path().to_path_buf(),
        })?;

        tracing::debug!(
            "scanned {}: package {} imports [{}]",
            file,
            parsed.package,
            parsed.imports.join(", ")
        );

        Ok(parsed)
    }

    /// Scan files in parallel; results come back in input order.
    pub fn scan_all(&self, files: &[SourceFile]) -> Result<Vec<ParsedUnit>, ScanError> {
        files.par_iter().map(|file| self.scan(file)).collect()
    }
}
