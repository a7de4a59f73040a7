//! Implementation of `goplan build`.
//!
//! A [`BuildSession`] plans units on demand into one [`BuildGraph`]. A unit
//! is finalized at most once: its sources are scanned, its packages
//! registered and ordered, and its tasks created, after every sibling it
//! names in `usepkg-local` has been finalized.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::builder::cross_unit::{self, LinkError, SiblingUnit};
use crate::builder::install::InstallPublisher;
use crate::builder::plan::{BuildGraph, BuildTask, PlannedUnit};
use crate::builder::{BuildContext, BuildExecutor};
use crate::core::registry::PackageRegistry;
use crate::core::source::SourceFile;
use crate::core::unit::{FormatMode, UnitDecl};
use crate::core::Workspace;
use crate::util::fs::expand_sources;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Units to build (empty = all)
    pub units: Vec<String>,

    /// Emit the task graph as JSON instead of running it
    pub emit_plan: bool,

    /// Install outputs after a successful build
    pub install: bool,

    /// Formatter mode requested on the command line
    pub format: Option<FormatMode>,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Verbose output
    pub verbose: bool,
}

/// A built artifact.
#[derive(Debug)]
pub struct Artifact {
    /// Artifact path
    pub path: PathBuf,

    /// Unit it belongs to
    pub unit: String,
}

/// Build result.
#[derive(Debug)]
pub struct BuildResult {
    /// Built artifacts
    pub artifacts: Vec<Artifact>,

    /// Installed files
    pub installed: Vec<PathBuf>,

    /// Task graph (if requested)
    pub plan: Option<PlanReport>,
}

/// A task as emitted by `build --plan`.
#[derive(Debug, Serialize)]
pub struct TaskReport<'a> {
    #[serde(flatten)]
    pub task: &'a BuildTask,

    /// Rendered command line
    pub command: Vec<String>,
}

/// The JSON document emitted by `build --plan`.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub units: Vec<PlannedUnit>,
    pub tasks: Vec<serde_json::Value>,
}

/// Plans units of one workspace into a shared graph.
pub struct BuildSession<'a> {
    ws: &'a Workspace,
    ctx: &'a BuildContext,
    graph: BuildGraph,
    planned: HashMap<String, PlannedUnit>,
    order: Vec<String>,
    in_progress: Vec<String>,
}

impl<'a> BuildSession<'a> {
    pub fn new(ws: &'a Workspace, ctx: &'a BuildContext) -> Self {
        BuildSession {
            ws,
            ctx,
            graph: BuildGraph::new(),
            planned: HashMap::new(),
            order: Vec::new(),
            in_progress: Vec::new(),
        }
    }

    /// Plan a unit, and first every unit it depends on.
    ///
    /// Finalizing a unit twice returns the first result.
    pub fn finalize(&mut self, name: &str) -> Result<&PlannedUnit> {
        if !self.planned.contains_key(name) {
            let planned = self.plan_unit(name)?;
            self.order.push(name.to_string());
            self.planned.insert(name.to_string(), planned);
        }

        Ok(&self.planned[name])
    }

    fn plan_unit(&mut self, name: &str) -> Result<PlannedUnit> {
        let ws = self.ws;
        let ctx = self.ctx;

        let decl = ws.unit(name).ok_or_else(|| LinkError::UnitNotFound {
            name: name.to_string(),
            required_by: "the command line".to_string(),
        })?;

        if let Some(pos) = self.in_progress.iter().position(|n| n == name) {
            let mut cycle = self.in_progress[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(LinkError::UnitCycle { cycle }.into());
        }

        self.in_progress.push(name.to_string());
        let result = self.plan_declared(decl, ctx);
        self.in_progress.pop();

        result.with_context(|| format!("failed to plan unit `{}`", name))
    }

    fn plan_declared(&mut self, decl: &UnitDecl, ctx: &BuildContext) -> Result<PlannedUnit> {
        let ws = self.ws;

        let siblings = cross_unit::collect_local(
            decl,
            |name: &str, required_by: &str| -> Result<SiblingUnit> {
                let sibling = ws.unit(name).ok_or_else(|| LinkError::UnitNotFound {
                    name: name.to_string(),
                    required_by: required_by.to_string(),
                })?;
                let planned = self.finalize(name)?.clone();
                Ok(SiblingUnit::from_planned(sibling, &planned, &self.graph))
            },
        )?;

        let registry = scan_unit(ws, ctx, decl)?;

        let planned = ctx.planner().plan(
            decl,
            &ctx.unit_dir(&decl.name),
            &registry,
            decl.format_mode(ctx.format_request),
            &mut self.graph,
        )?;

        cross_unit::apply_local(&mut self.graph, &planned, &siblings);
        cross_unit::apply_external(&mut self.graph, &planned, &decl.usepkg, &ctx.libraries);

        tracing::info!(
            "planned unit `{}` ({}): {} package(s)",
            decl.name,
            decl.kind,
            registry.len()
        );

        Ok(planned)
    }

    /// The graph built so far.
    pub fn graph(&self) -> &BuildGraph {
        &self.graph
    }

    /// Planned units in the order they were finalized.
    pub fn planned_units(&self) -> impl Iterator<Item = &PlannedUnit> {
        self.order.iter().filter_map(|name| self.planned.get(name))
    }

    /// The JSON report of the current graph.
    pub fn report(&self) -> Result<PlanReport> {
        let tasks = self
            .graph
            .tasks()
            .iter()
            .map(|task| {
                let spec = task.step.command(self.ctx.toolchain.as_ref());
                let mut command = vec![spec.program.display().to_string()];
                command.extend(spec.args);
                serde_json::to_value(TaskReport { task, command })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PlanReport {
            units: self.planned_units().cloned().collect(),
            tasks,
        })
    }
}

/// Expand, scan, and register the sources of one unit.
pub fn scan_unit(ws: &Workspace, ctx: &BuildContext, decl: &UnitDecl) -> Result<PackageRegistry> {
    let paths = expand_sources(ws.root(), &decl.source)?;
    let files: Vec<SourceFile> = paths
        .into_iter()
        .map(|path| SourceFile::new(ws.root(), path))
        .collect();

    let parsed = ctx.scanner.scan_all(&files)?;

    let mut registry = PackageRegistry::new(&decl.target);
    for (unit, file) in parsed.into_iter().zip(files) {
        registry.register(unit, file);
    }
    registry.filter_dependencies();

    Ok(registry)
}

/// Build the selected units of a workspace.
pub fn build(ws: &Workspace, ctx: &BuildContext, opts: &BuildOptions) -> Result<BuildResult> {
    let selected = ws.select_units(&opts.units)?;
    if selected.is_empty() {
        anyhow::bail!("no units to build");
    }

    let mut session = BuildSession::new(ws, ctx);
    for unit in &selected {
        session.finalize(&unit.name)?;
    }

    if opts.emit_plan {
        let report = session.report()?;
        let plan_json = serde_json::to_string_pretty(&report)?;
        println!("{}", plan_json);

        return Ok(BuildResult {
            artifacts: vec![],
            installed: vec![],
            plan: Some(report),
        });
    }

    let artifacts = BuildExecutor::new(ctx)
        .verbose(opts.verbose)
        .execute(session.graph(), opts.jobs)?;

    let mut installed = Vec::new();
    if opts.install {
        let publisher = InstallPublisher::new(&ctx.env);
        for unit in &selected {
            if let Some(planned) = session.planned.get(&unit.name) {
                let paths = publisher
                    .publish(unit, planned, session.graph())
                    .with_context(|| format!("failed to install unit `{}`", unit.name))?;
                installed.extend(paths);
            }
        }
    }

    Ok(BuildResult {
        artifacts,
        installed,
        plan: None,
    })
}

/// Summary of one unit as reported by `goplan scan`.
#[derive(Debug, Serialize)]
pub struct UnitScan {
    pub unit: String,
    pub packages: BTreeMap<String, PackageScan>,
}

/// One package of a [`UnitScan`].
#[derive(Debug, Serialize)]
pub struct PackageScan {
    pub files: Vec<PathBuf>,
    pub imports: Vec<String>,
    pub dependencies: Vec<String>,
}

/// Scan the selected units without planning them.
pub fn scan(ws: &Workspace, ctx: &BuildContext, units: &[String]) -> Result<Vec<UnitScan>> {
    ws.select_units(units)?
        .into_iter()
        .map(|decl| {
            let registry = scan_unit(ws, ctx, decl)
                .with_context(|| format!("failed to scan unit `{}`", decl.name))?;
            let packages = registry
                .packages()
                .map(|p| {
                    (
                        p.name.clone(),
                        PackageScan {
                            files: p.files.iter().map(|f| f.rel_path().to_path_buf()).collect(),
                            imports: p.imports.clone(),
                            dependencies: p.dependencies.iter().cloned().collect(),
                        },
                    )
                })
                .collect();
            Ok(UnitScan {
                unit: decl.name.clone(),
                packages,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::plan::BuildStep;
    use crate::builder::toolchain::GcToolchain;
    use crate::core::manifest::MANIFEST_NAME;
    use crate::util::config::{GoArch, GoEnv, GoOs, ToolchainSettings};
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn env() -> GoEnv {
        GoEnv {
            goroot: PathBuf::from("/go"),
            goos: GoOs::Linux,
            goarch: GoArch::Amd64,
            prefix: PathBuf::from("/usr/local"),
        }
    }

    fn workspace(manifest: &str, files: &[(&str, &str)]) -> (TempDir, Workspace) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), manifest).unwrap();
        for (path, contents) in files {
            let full = tmp.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, contents).unwrap();
        }
        let ws = Workspace::new(&tmp.path().join(MANIFEST_NAME)).unwrap();
        (tmp, ws)
    }

    fn context(ws: &Workspace) -> BuildContext {
        let env = env();
        let tc = GcToolchain::unresolved(&env, &ToolchainSettings::default());
        BuildContext::with_toolchain(ws, env, Arc::new(tc))
    }

    const FOO_BAR: &str = r#"
[[unit]]
kind = "package"
target = "foo"
source = ["foo/foo.go", "foo/foo2.go"]

[[unit]]
target = "bar"
source = ["bar/main.go"]
usepkg-local = ["foo"]
"#;

    fn foo_bar() -> (TempDir, Workspace) {
        workspace(
            FOO_BAR,
            &[
                ("foo/foo.go", "package foo\n\nimport \"fmt\"\n\nfunc Foo() { fmt.Println() }\n"),
                ("foo/foo2.go", "package foo\n\nfunc Foo2() {}\n"),
                (
                    "bar/main.go",
                    "package main\n\nimport (\n\t\"fmt\"\n\t\"foo\"\n)\n\nfunc main() { foo.Foo() }\n",
                ),
            ],
        )
    }

    #[test]
    fn test_program_using_local_package() {
        let (tmp, ws) = foo_bar();
        let ctx = context(&ws);
        let mut session = BuildSession::new(&ws, &ctx);

        let bar = session.finalize("bar").unwrap().clone();
        let foo = session.planned["foo"].clone();
        let graph = session.graph();

        // foo: one compile of both files, one archive
        let foo_compile = foo.compile["foo"];
        match &graph.get(foo_compile).unwrap().step {
            BuildStep::Compile(s) => {
                assert_eq!(
                    s.sources,
                    vec![tmp.path().join("foo/foo.go"), tmp.path().join("foo/foo2.go")]
                );
                assert_eq!(s.output, ws.unit_dir("foo").join("foo.6"));
            }
            other => panic!("unexpected step {}", other.kind()),
        }
        let foo_archive = foo.archives["foo"];
        assert_eq!(graph.output(foo_archive), Some(ws.unit_dir("foo").join("foo.a").as_path()));

        // bar: compile after foo's archive, searching foo's output dir
        let bar_compile = graph.get(bar.compile["main"]).unwrap();
        assert_eq!(bar_compile.run_after, BTreeSet::from([foo_archive]));
        match &bar_compile.step {
            BuildStep::Compile(s) => {
                assert_eq!(s.include_dirs, vec![ws.unit_dir("bar"), ws.unit_dir("foo")]);
                assert_eq!(s.output, ws.unit_dir("bar").join("bar.6"));
            }
            other => panic!("unexpected step {}", other.kind()),
        }

        let link = bar.link.unwrap();
        assert_eq!(graph.output(link), Some(ws.unit_dir("bar").join("bar").as_path()));
        assert_eq!(graph.get(link).unwrap().run_after, BTreeSet::from([bar.compile["main"]]));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_finalize_is_memoized() {
        let (_tmp, ws) = foo_bar();
        let ctx = context(&ws);
        let mut session = BuildSession::new(&ws, &ctx);

        session.finalize("foo").unwrap();
        session.finalize("bar").unwrap();
        session.finalize("foo").unwrap();

        assert_eq!(session.graph().len(), 4);
        let names: Vec<_> = session.planned_units().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
    }

    #[test]
    fn test_unknown_local_unit() {
        let (_tmp, ws) = workspace(
            "[[unit]]\ntarget = \"bar\"\nsource = [\"main.go\"]\nusepkg-local = [\"nope\"]\n",
            &[("main.go", "package main\n")],
        );
        let ctx = context(&ws);

        let err = BuildSession::new(&ws, &ctx).finalize("bar").unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("failed to plan unit `bar`"));
        assert!(msg.contains("unit `nope` required by `bar` is not declared"));
    }

    #[test]
    fn test_unit_cycle_is_detected() {
        let (_tmp, ws) = workspace(
            r#"
[[unit]]
kind = "package"
target = "a"
source = ["a.go"]
usepkg-local = ["b"]

[[unit]]
kind = "package"
target = "b"
source = ["b.go"]
usepkg-local = ["a"]
"#,
            &[("a.go", "package a\n"), ("b.go", "package b\n")],
        );
        let ctx = context(&ws);

        let err = BuildSession::new(&ws, &ctx).finalize("a").unwrap_err();
        let cycle = err
            .chain()
            .find_map(|e| e.downcast_ref::<LinkError>())
            .unwrap();
        match cycle {
            LinkError::UnitCycle { cycle } => assert_eq!(cycle, &vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scan_error_names_the_file() {
        let (_tmp, ws) = workspace(
            "[[unit]]\ntarget = \"bad\"\nsource = [\"src/*.go\"]\n",
            &[("src/ok.go", "package main\n"), ("src/broken.go", "// nothing here\n")],
        );
        let ctx = context(&ws);

        let err = BuildSession::new(&ws, &ctx).finalize("bad").unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("failed to plan unit `bad`"));
        assert!(msg.contains(&Path::new("src").join("broken.go").display().to_string()));
    }

    #[test]
    fn test_report_renders_commands() {
        let (_tmp, ws) = foo_bar();
        let ctx = context(&ws);
        let mut session = BuildSession::new(&ws, &ctx);
        session.finalize("bar").unwrap();

        let report = session.report().unwrap();
        assert_eq!(report.units.len(), 2);
        assert_eq!(report.tasks.len(), 4);
        assert_eq!(report.tasks[0]["type"], "compile");
        assert_eq!(report.tasks[0]["command"][0], "6g");
        assert_eq!(report.tasks[1]["type"], "archive");
        assert_eq!(report.tasks[1]["command"][1], "grc");
        assert_eq!(report.tasks[3]["type"], "link");
    }

    #[test]
    fn test_scan_lists_packages() {
        let (_tmp, ws) = foo_bar();
        let ctx = context(&ws);

        let scans = scan(&ws, &ctx, &["bar".to_string()]).unwrap();
        assert_eq!(scans.len(), 1);
        let main = &scans[0].packages["main"];
        assert_eq!(main.imports, vec!["fmt", "foo"]);
        assert!(main.dependencies.is_empty());
    }
}
