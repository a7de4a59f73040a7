//! Source normalization ahead of package/import extraction.
//!
//! The scanner matches patterns over source text, so comments must be gone
//! first or a commented-out `import` would count. Either the external
//! formatter does it (`gofmt -comments=false`) or the in-process stripper
//! below does.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::scanner::ScanError;
use crate::util::process::ProcessBuilder;

/// First top-level declaration; package and import clauses precede it.
static FIRST_DECL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:func|type|var|const)\b").unwrap());

/// How a file is turned into canonical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalizer {
    /// Strip comments in-process
    Builtin,
    /// Run the formatter with comments disabled and read its output
    Formatter(PathBuf),
}

impl Normalizer {
    /// Produce the canonical text of `path`.
    pub fn normalize(&self, path: &Path) -> Result<String, ScanError> {
        match self {
            Normalizer::Builtin => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| ScanError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Ok(strip_comments(&content))
            }
            Normalizer::Formatter(gofmt) => run_formatter(gofmt, path),
        }
    }
}

fn run_formatter(gofmt: &Path, path: &Path) -> Result<String, ScanError> {
    let failed = |message: String| ScanError::Formatter {
        path: path.to_path_buf(),
        message,
    };

    let output = ProcessBuilder::new(gofmt)
        .arg("-comments=false")
        .arg(path)
        .exec()
        .map_err(|e| failed(format!("{:#}", e)))?;

    if !output.status.success() {
        return Err(failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Clone, Copy)]
enum State {
    Code,
    LineComment,
    BlockComment { newline: bool },
    Interpreted,
    Raw,
    Rune,
}

/// Remove `//` and `/* */` comments, leaving string and rune literals intact.
///
/// A block comment becomes a newline if it spanned lines and a space
/// otherwise, so statement boundaries survive. A leading byte order mark
/// is dropped, as the compiler and the formatter both do.
pub fn strip_comments(src: &str) -> String {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut state = State::Code;

    while let Some(c) = chars.next() {
        state = match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    State::LineComment
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    State::BlockComment { newline: false }
                }
                '"' => {
                    out.push(c);
                    State::Interpreted
                }
                '`' => {
                    out.push(c);
                    State::Raw
                }
                '\'' => {
                    out.push(c);
                    State::Rune
                }
                _ => {
                    out.push(c);
                    State::Code
                }
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    State::Code
                } else {
                    State::LineComment
                }
            }
            State::BlockComment { newline } => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push(if newline { '\n' } else { ' ' });
                    State::Code
                } else {
                    State::BlockComment {
                        newline: newline || c == '\n',
                    }
                }
            }
            State::Interpreted | State::Rune => {
                out.push(c);
                let closing = if matches!(state, State::Rune) { '\'' } else { '"' };
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                    state
                } else if c == closing || c == '\n' {
                    State::Code
                } else {
                    state
                }
            }
            State::Raw => {
                out.push(c);
                if c == '`' {
                    State::Code
                } else {
                    State::Raw
                }
            }
        };
    }

    out
}

/// The part of `text` before the first top-level declaration.
pub fn header(text: &str) -> &str {
    match FIRST_DECL_RE.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}
