//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Expand source patterns relative to a base directory.
///
/// Plain paths are kept in declaration order; glob patterns expand to their
/// sorted matches. A path listed twice is kept once.
pub fn expand_sources(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut results: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern);

        if !is_glob(pattern) {
            if !results.contains(&full_pattern) {
                results.push(full_pattern);
            }
            continue;
        }

        let pattern_str = full_pattern.to_string_lossy();
        let mut matches = Vec::new();
        for entry in glob(&pattern_str)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
        {
            match entry {
                Ok(path) if path.is_file() => matches.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("glob error: {}", e),
            }
        }
        matches.sort();

        for path in matches {
            if !results.contains(&path) {
                results.push(path);
            }
        }
    }

    Ok(results)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(&['*', '?', '['][..])
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Copy a file and set its permission bits.
pub fn copy_with_mode(src: &Path, dst: &Path, mode: u32) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    set_mode(dst, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to set mode {:o} on {}", mode, path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_expand_sources_mixes_globs_and_paths() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("foo");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("b.go"), "package foo").unwrap();
        fs::write(src.join("a.go"), "package foo").unwrap();
        fs::write(src.join("README"), "readme").unwrap();
        fs::write(tmp.path().join("main.go"), "package main").unwrap();

        let files = expand_sources(
            tmp.path(),
            &[
                "main.go".to_string(),
                "foo/*.go".to_string(),
                "foo/a.go".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(
            files,
            vec![
                tmp.path().join("main.go"),
                src.join("a.go"),
                src.join("b.go"),
            ]
        );
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/ws"), Path::new("/ws/foo/foo.go")),
            PathBuf::from("foo/foo.go")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_with_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("bar");
        fs::write(&src, "binary").unwrap();
        let dst = tmp.path().join("bin").join("bar");

        copy_with_mode(&src, &dst, 0o755).unwrap();

        let mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "binary");
    }
}
