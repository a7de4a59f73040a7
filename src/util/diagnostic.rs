//! Hints printed under a fatal error.
//!
//! The binary prints the error chain first (`error: ...`), then the
//! diagnostic of the first typed error in that chain: the file involved,
//! what was found, and what to change.

use std::fmt::{self, Write as _};
use std::path::PathBuf;

/// Shared suggestion texts.
pub mod suggestions {
    pub const NO_MANIFEST: &str = "Create a Goplan.toml declaring at least one [[unit]]";

    pub const UNIT_NOT_FOUND: &str = "Run `goplan scan` to list the declared units";

    /// Attached as context to the first failing task.
    pub const BUILD_FAILED: &str = "build failed; rerun with --verbose to see every command";
}

/// A problem, where it happened, and how to fix it.
#[derive(Debug, Clone, Default)]
pub struct Diagnostic {
    pub message: String,
    pub location: Option<PathBuf>,
    /// What was found, one fact per line
    pub notes: Vec<String>,
    pub help: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Render for a terminal, with ANSI colours when `color` is set.
    pub fn format(&self, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("\x1b[{}m{}\x1b[0m", code, text)
            } else {
                text.to_string()
            }
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", paint("1;36", "note"), self.message);
        if let Some(path) = &self.location {
            let _ = writeln!(out, "  --> {}", path.display());
        }
        for note in &self.notes {
            let _ = writeln!(out, "   = {}", note);
        }
        for help in &self.help {
            let _ = writeln!(out, "   {} {}", paint("1;32", "help:"), help);
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("no `main` package in unit `bar`")
            .with_location("src/bar/main.go")
            .with_context("packages found: foo, util")
            .with_suggestion("Declare the unit with kind = \"package\"")
            .with_suggestion("Add a file with `package main`");

        let output = diag.to_string();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "note: no `main` package in unit `bar`");
        assert_eq!(lines[1], "  --> src/bar/main.go");
        assert_eq!(lines[2], "   = packages found: foo, util");
        assert_eq!(lines[4], "   help: Add a file with `package main`");
    }

    #[test]
    fn test_color_only_when_requested() {
        let diag = Diagnostic::error("x").with_suggestion("y");

        assert!(!diag.format(false).contains('\x1b'));
        assert!(diag.format(true).contains("\x1b[1;32mhelp:\x1b[0m"));
    }
}
