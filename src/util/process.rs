//! Running toolchain programs.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{bail, Context, Result};

use crate::builder::toolchain::CommandSpec;

/// Lines of a failing program's stderr kept in the error message.
const STDERR_TAIL: usize = 20;

/// A [`CommandSpec`] bound to a working directory, ready to run.
///
/// Output is always captured; nothing is inherited from the terminal.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    spec: CommandSpec,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            spec: CommandSpec::new(program.as_ref()),
            cwd: None,
        }
    }

    /// Wrap a command rendered by a toolchain.
    pub fn from_spec(spec: &CommandSpec) -> Self {
        ProcessBuilder {
            spec: spec.clone(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.spec = self.spec.arg(arg.as_ref().to_string_lossy());
        self
    }

    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.spec.args
    }

    /// Run to completion, capturing stdout and stderr.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .envs(self.spec.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.output()
            .with_context(|| format!("failed to run `{}`", self.spec.program.display()))
    }

    /// Run to completion; a non-zero exit is an error carrying the tail of
    /// stderr.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL)..].join("\n");

        match output.status.code() {
            Some(code) => bail!("`{}` exited with status {}\n{}", self.display_command(), code, tail),
            None => bail!("`{}` was terminated by a signal\n{}", self.display_command(), tail),
        }
    }

    pub fn display_command(&self) -> String {
        self.spec.display()
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find an executable in `dir` first, then in PATH.
pub fn find_executable_in(dir: &Path, name: &str) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }
    find_executable(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_spec_keeps_arguments() {
        let spec = CommandSpec::new("gopack").args(["grc", "foo.a", "foo.6"]);
        let pb = ProcessBuilder::from_spec(&spec);

        assert_eq!(pb.get_args(), &["grc", "foo.a", "foo.6"]);
        assert_eq!(pb.display_command(), "gopack grc foo.a foo.6");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_passes_environment_and_cwd() {
        let tmp = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo $GOARCH; pwd"])
            .env("GOARCH", "arm");

        let output = ProcessBuilder::from_spec(&spec)
            .cwd(tmp.path())
            .exec()
            .unwrap();
        let stdout = String::from_utf8_lossy(&output.stdout);

        assert!(stdout.starts_with("arm\n"));
        let dir = tmp.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(stdout.trim_end().ends_with(&dir));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_and_check_reports_stderr() {
        let err = ProcessBuilder::new("sh")
            .arg("-c")
            .arg("echo 'foo.go:3: undefined: bar' >&2; exit 2")
            .exec_and_check()
            .unwrap_err()
            .to_string();

        assert!(err.contains("exited with status 2"));
        assert!(err.contains("undefined: bar"));
    }

    #[test]
    fn test_find_executable_in_prefers_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tool = tmp.path().join("6g");
        std::fs::write(&tool, "").unwrap();

        assert_eq!(find_executable_in(tmp.path(), "6g"), Some(tool));
    }
}
