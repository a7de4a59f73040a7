//! Toolchain detection functions.

use std::path::PathBuf;

use super::GcToolchain;
use crate::util::config::{ConfigError, GoEnv, ToolchainSettings};
use crate::util::process::find_executable_in;

/// Locate the gc toolchain programs.
///
/// Each program is taken from the `[toolchain]` override if set, else
/// from `$GOROOT/bin`, else from `PATH`. Every missing program is
/// reported in one error.
pub fn detect_toolchain(
    env: &GoEnv,
    settings: &ToolchainSettings,
) -> Result<GcToolchain, ConfigError> {
    let letter = env.goarch.letter();
    let bin_dir = env.bin_dir();
    let mut problems = Vec::new();

    let mut locate = |configured: &Option<PathBuf>, name: String| -> PathBuf {
        if let Some(path) = configured {
            if path.exists() {
                return path.clone();
            }
            problems.push(ConfigError::ProgramNotFound {
                program: path.display().to_string(),
                searched: "the [toolchain] table".to_string(),
            });
            return path.clone();
        }

        match find_executable_in(&bin_dir, &name) {
            Some(path) => path,
            None => {
                problems.push(ConfigError::ProgramNotFound {
                    searched: format!("{} and PATH", bin_dir.display()),
                    program: name.clone(),
                });
                PathBuf::from(name)
            }
        }
    };

    let gc = locate(&settings.gc, format!("{letter}g"));
    let ld = locate(&settings.ld, format!("{letter}l"));
    let pack = locate(&settings.pack, "gopack".to_string());
    let fmt = locate(&settings.fmt, "gofmt".to_string());

    if !problems.is_empty() {
        return Err(ConfigError::from_problems(problems));
    }

    tracing::debug!(
        "using toolchain: gc={}, ld={}, pack={}, fmt={}",
        gc.display(),
        ld.display(),
        pack.display(),
        fmt.display()
    );

    Ok(GcToolchain::new(env, gc, ld, pack, fmt)
        .with_flags(settings.goflags.clone(), settings.goldflags.clone()))
}
