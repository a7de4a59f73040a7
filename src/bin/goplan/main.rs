//! goplan CLI - package-aware builds for the gc Go toolchain

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use goplan::builder::{LinkError, PlanError};
use goplan::core::ManifestError;
use goplan::util::diagnostic::{emit, Diagnostic};
use goplan::{ConfigError, ScanError};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        if let Some(diag) = diagnostic_for(&e) {
            emit(&diag, false);
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.global.verbose {
        EnvFilter::new("goplan=debug")
    } else {
        EnvFilter::new("goplan=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &cli.global),
        Commands::Scan(args) => commands::scan::execute(args, &cli.global),
        Commands::Clean(args) => commands::clean::execute(args, &cli.global),
    }
}

/// Hints for the first typed error in the chain.
fn diagnostic_for(err: &anyhow::Error) -> Option<Diagnostic> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            Some(e.to_diagnostic())
        } else if let Some(e) = cause.downcast_ref::<ScanError>() {
            Some(e.to_diagnostic())
        } else if let Some(e) = cause.downcast_ref::<PlanError>() {
            Some(e.to_diagnostic())
        } else if let Some(e) = cause.downcast_ref::<LinkError>() {
            Some(e.to_diagnostic())
        } else {
            cause
                .downcast_ref::<ManifestError>()
                .map(|e| e.to_diagnostic())
        }
    })
}
