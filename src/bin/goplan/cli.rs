//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// goplan - package-aware builds for the gc Go toolchain
#[derive(Parser)]
#[command(name = "goplan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to Goplan.toml (default: search upwards from the current directory)
    #[arg(long, global = true, env = "GOPLAN_MANIFEST")]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan and build units
    Build(BuildArgs),

    /// Show the packages and imports found in each unit
    Scan(ScanArgs),

    /// Remove build artifacts
    Clean(CleanArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Units to build (default: all)
    #[arg(short, long)]
    pub unit: Vec<String>,

    /// Emit the task graph as JSON (no build)
    #[arg(long)]
    pub plan: bool,

    /// Install outputs after building
    #[arg(long, conflicts_with = "plan")]
    pub install: bool,

    /// Rewrite sources with gofmt before compiling
    #[arg(long, conflicts_with = "gofmt_list")]
    pub gofmt: bool,

    /// List sources gofmt would change
    #[arg(long)]
    pub gofmt_list: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Units to scan (default: all)
    #[arg(short, long)]
    pub unit: Vec<String>,

    /// Print JSON instead of a listing
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CleanArgs {}
