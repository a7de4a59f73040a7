//! The gc toolchain: `Ng` compiler, `Nl` linker, `gopack`, `gofmt`.

use std::path::{Path, PathBuf};

use super::{ArchiveInput, CommandSpec, CompileInput, LinkInput, Toolchain};
use crate::core::unit::FormatMode;
use crate::util::config::{GoEnv, ToolchainSettings};

/// Flags passed to `gopack`: create, replace, and (re)build the symbol table.
const PACK_FLAGS: &str = "grc";

/// gc toolchain implementation.
#[derive(Debug, Clone)]
pub struct GcToolchain {
    /// Compiler (e.g. `6g`)
    pub gc: PathBuf,
    /// Linker (e.g. `6l`)
    pub ld: PathBuf,
    /// Archiver
    pub pack: PathBuf,
    /// Formatter
    pub fmt: PathBuf,
    /// Extra compiler flags
    pub goflags: Vec<String>,
    /// Extra linker flags
    pub goldflags: Vec<String>,
    object_ext: String,
    /// `GOROOT`/`GOOS`/`GOARCH` as validated, exported to every command
    exports: Vec<(String, String)>,
}

impl GcToolchain {
    /// Create a toolchain from resolved program paths.
    pub fn new(env: &GoEnv, gc: PathBuf, ld: PathBuf, pack: PathBuf, fmt: PathBuf) -> Self {
        GcToolchain {
            gc,
            ld,
            pack,
            fmt,
            goflags: Vec::new(),
            goldflags: Vec::new(),
            object_ext: env.object_ext(),
            exports: vec![
                ("GOROOT".to_string(), env.goroot.display().to_string()),
                ("GOOS".to_string(), env.goos.to_string()),
                ("GOARCH".to_string(), env.goarch.to_string()),
            ],
        }
    }

    /// A toolchain that refers to its programs by bare name.
    ///
    /// Used when commands are only rendered, never run (`build --plan`).
    pub fn unresolved(env: &GoEnv, settings: &ToolchainSettings) -> Self {
        let letter = env.goarch.letter();
        let pick = |configured: &Option<PathBuf>, name: String| {
            configured.clone().unwrap_or_else(|| PathBuf::from(name))
        };

        GcToolchain::new(
            env,
            pick(&settings.gc, format!("{letter}g")),
            pick(&settings.ld, format!("{letter}l")),
            pick(&settings.pack, "gopack".to_string()),
            pick(&settings.fmt, "gofmt".to_string()),
        )
        .with_flags(settings.goflags.clone(), settings.goldflags.clone())
    }

    /// Set the extra compiler and linker flags.
    pub fn with_flags(mut self, goflags: Vec<String>, goldflags: Vec<String>) -> Self {
        self.goflags = goflags;
        self.goldflags = goldflags;
        self
    }

    fn command(&self, program: &Path) -> CommandSpec {
        self.exports
            .iter()
            .fold(CommandSpec::new(program), |cmd, (k, v)| cmd.env(k, v))
    }
}

impl Toolchain for GcToolchain {
    fn formatter_path(&self) -> &Path {
        &self.fmt
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = self.command(&self.gc).args(self.goflags.iter().cloned());

        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        cmd = cmd.arg("-o").arg(input.output.display().to_string());

        for src in &input.sources {
            cmd = cmd.arg(src.display().to_string());
        }

        cmd
    }

    fn link_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = self.command(&self.ld).args(self.goldflags.iter().cloned());

        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }

        cmd = cmd.arg("-o").arg(input.output.display().to_string());

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        cmd
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        let mut cmd = self.command(&self.pack)
            .arg(PACK_FLAGS)
            .arg(input.output.display().to_string());

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        cmd
    }

    fn format_command(&self, files: &[PathBuf], mode: FormatMode) -> CommandSpec {
        let flag = match mode {
            FormatMode::Write => "-w",
            FormatMode::List => "-l",
        };

        self.command(&self.fmt)
            .arg(flag)
            .args(files.iter().map(|f| f.display().to_string()))
    }

    fn object_extension(&self) -> &str {
        &self.object_ext
    }

    fn archive_extension(&self) -> &str {
        ".a"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::{GoArch, GoOs};

    fn env(goarch: GoArch) -> GoEnv {
        GoEnv {
            goroot: PathBuf::from("/go"),
            goos: GoOs::Linux,
            goarch,
            prefix: PathBuf::from("/usr/local"),
        }
    }

    fn toolchain() -> GcToolchain {
        GcToolchain::unresolved(&env(GoArch::Amd64), &ToolchainSettings::default())
    }

    #[test]
    fn test_program_names_follow_arch_letter() {
        let tc = GcToolchain::unresolved(&env(GoArch::I386), &ToolchainSettings::default());
        assert_eq!(tc.gc, PathBuf::from("8g"));
        assert_eq!(tc.ld, PathBuf::from("8l"));
        assert_eq!(tc.object_extension(), ".8");

        let tc = GcToolchain::unresolved(&env(GoArch::Arm), &ToolchainSettings::default());
        assert_eq!(tc.gc, PathBuf::from("5g"));
        assert_eq!(tc.object_extension(), ".5");
    }

    #[test]
    fn test_overrides_are_kept() {
        let settings = ToolchainSettings {
            gc: Some(PathBuf::from("/opt/bin/6g")),
            goflags: vec!["-S".to_string()],
            ..Default::default()
        };
        let tc = GcToolchain::unresolved(&env(GoArch::Amd64), &settings);

        assert_eq!(tc.gc, PathBuf::from("/opt/bin/6g"));
        assert_eq!(tc.ld, PathBuf::from("6l"));
        assert_eq!(tc.goflags, vec!["-S"]);
    }

    #[test]
    fn test_compile_command() {
        let cmd = toolchain().compile_command(&CompileInput {
            sources: vec![PathBuf::from("foo.go"), PathBuf::from("foo2.go")],
            output: PathBuf::from("out/foo.6"),
            include_dirs: vec![PathBuf::from("out"), PathBuf::from("/lib/bar")],
        });

        assert_eq!(
            cmd.display(),
            "6g -Iout -I/lib/bar -o out/foo.6 foo.go foo2.go"
        );
    }

    #[test]
    fn test_link_command_with_flags() {
        let tc = toolchain().with_flags(Vec::new(), vec!["-s".to_string()]);
        let cmd = tc.link_command(&LinkInput {
            objects: vec![PathBuf::from("out/bar.6")],
            output: PathBuf::from("out/bar"),
            lib_dirs: vec![PathBuf::from("out"), PathBuf::from("foo-out")],
        });

        assert_eq!(cmd.display(), "6l -s -Lout -Lfoo-out -o out/bar out/bar.6");
    }

    #[test]
    fn test_archive_command() {
        let cmd = toolchain().archive_command(&ArchiveInput {
            objects: vec![PathBuf::from("out/foo.6")],
            output: PathBuf::from("out/foo.a"),
        });

        assert_eq!(cmd.display(), "gopack grc out/foo.a out/foo.6");
    }

    #[test]
    fn test_commands_export_go_environment() {
        let tc = GcToolchain::unresolved(&env(GoArch::Arm), &ToolchainSettings::default());
        let cmd = tc.format_command(&[PathBuf::from("a.go")], FormatMode::List);

        assert!(cmd.env.contains(&("GOROOT".to_string(), "/go".to_string())));
        assert!(cmd.env.contains(&("GOOS".to_string(), "linux".to_string())));
        assert!(cmd.env.contains(&("GOARCH".to_string(), "arm".to_string())));
    }

    #[test]
    fn test_format_command_modes() {
        let files = vec![PathBuf::from("a.go"), PathBuf::from("b.go")];

        assert_eq!(
            toolchain().format_command(&files, FormatMode::Write).display(),
            "gofmt -w a.go b.go"
        );
        assert_eq!(
            toolchain().format_command(&files, FormatMode::List).display(),
            "gofmt -l a.go b.go"
        );
    }
}
