//! Build executor with progress reporting.
//!
//! Runs a [`BuildGraph`] wave by wave: every task whose predecessors have
//! finished runs in parallel on the rayon pool. A failing task stops the
//! build once its wave has completed.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::builder::context::BuildContext;
use crate::builder::plan::{BuildGraph, BuildStep, BuildTask};
use crate::core::unit::FormatMode;
use crate::ops::goplan_build::Artifact;
use crate::util::diagnostic::suggestions;
use crate::util::fs::ensure_dir;
use crate::util::process::ProcessBuilder;

/// Build executor with progress tracking.
pub struct BuildExecutor<'a> {
    ctx: &'a BuildContext,
    verbose: bool,
}

impl<'a> BuildExecutor<'a> {
    /// Create a new build executor.
    pub fn new(ctx: &'a BuildContext) -> Self {
        BuildExecutor {
            ctx,
            verbose: false,
        }
    }

    /// Enable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Execute every task of the graph.
    pub fn execute(&self, graph: &BuildGraph, jobs: Option<usize>) -> Result<Vec<Artifact>> {
        let start = Instant::now();

        let waves = graph.waves();
        let scheduled: usize = waves.iter().map(Vec::len).sum();
        if scheduled != graph.len() {
            bail!(
                "{} task(s) wait on each other and can never run",
                graph.len() - scheduled
            );
        }

        if self.verbose {
            eprintln!("   Compiling {} package(s)", graph.count("compile"));
            eprintln!(
                "     Linking {} program(s), {} archive(s)",
                graph.count("link"),
                graph.count("archive")
            );
        }

        let pb = if !self.verbose && graph.len() > 1 {
            let pb = ProgressBar::new(graph.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut pool = rayon::ThreadPoolBuilder::new();
        if let Some(j) = jobs {
            pool = pool.num_threads(j);
        }
        let pool = pool.build().context("failed to start worker threads")?;

        let mut artifacts = Vec::new();
        for wave in waves {
            let tasks: Vec<&BuildTask> = wave.iter().filter_map(|&id| graph.get(id)).collect();

            let results: Vec<Result<()>> = pool.install(|| {
                tasks
                    .par_iter()
                    .map(|task| {
                        let result = self.run(task);
                        if let Some(pb) = &pb {
                            pb.set_message(format!("{} {}", task.step.kind(), task.unit));
                            pb.inc(1);
                        }
                        result
                    })
                    .collect()
            });

            let failures: Vec<anyhow::Error> = results.into_iter().filter_map(Result::err).collect();
            if let Some(first) = failures.into_iter().next() {
                if let Some(pb) = &pb {
                    pb.abandon_with_message("failed");
                }
                return Err(first.context(suggestions::BUILD_FAILED));
            }

            for task in tasks {
                if let Some(path) = task.step.output() {
                    artifacts.push(Artifact {
                        path: path.to_path_buf(),
                        unit: task.unit.clone(),
                    });
                }
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }

        eprintln!(
            "    Finished {} task(s) in {:.2}s",
            graph.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(artifacts)
    }

    /// Run a single task.
    fn run(&self, task: &BuildTask) -> Result<()> {
        if let Some(parent) = task.step.output().and_then(|p| p.parent()) {
            ensure_dir(parent)?;
        }

        let spec = task.step.command(self.ctx.toolchain.as_ref());
        let cmd = ProcessBuilder::from_spec(&spec).cwd(&self.ctx.workspace_root);

        if self.verbose {
            eprintln!("     Running `{}`", cmd.display_command());
        }
        tracing::debug!("{} {}: {}", task.id, task.unit, cmd.display_command());

        let output = cmd
            .exec_and_check()
            .with_context(|| format!("{} step of unit `{}` failed", task.step.kind(), task.unit))?;

        if let BuildStep::Format(step) = &task.step {
            if step.mode == FormatMode::List {
                let listed = String::from_utf8_lossy(&output.stdout);
                for file in listed.lines().filter(|l| !l.trim().is_empty()) {
                    tracing::warn!("{}: {} is not formatted", task.unit, file);
                }
            }
        }

        Ok(())
    }
}
