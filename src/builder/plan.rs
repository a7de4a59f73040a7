//! Build graph planning.
//!
//! A [`BuildGraph`] is an arena of tasks for one invocation. Each unit is
//! planned into it by [`BuildGraphPlanner`]: one compile task per package,
//! ordered along the package dependency graph, followed by either a link
//! task (programs) or one archive task per package (packages). Cross-unit
//! edges are added afterwards by [`crate::builder::cross_unit`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::toolchain::{ArchiveInput, CommandSpec, CompileInput, LinkInput, Toolchain};
use crate::core::registry::{PackageRegistry, MAIN_PACKAGE};
use crate::core::unit::{FormatMode, UnitDecl, UnitKind};
use crate::util::diagnostic::Diagnostic;

/// Error while planning a unit. No task is created when planning fails.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("unit `{unit}`: package `{package}` depends on unknown package `{dependency}`")]
    MissingPackage {
        unit: String,
        package: String,
        dependency: String,
    },

    #[error("unit `{unit}` is a program but has no `main` package")]
    NoMainPackage { unit: String },

    #[error("unit `{unit}`: import cycle between packages {}", .cycle.join(" -> "))]
    DependencyCycle { unit: String, cycle: Vec<String> },
}

impl PlanError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            PlanError::MissingPackage {
                package,
                dependency,
                ..
            } => Diagnostic::error(self.to_string())
                .with_context(format!(
                    "no source of this unit declares `package {}`",
                    dependency
                ))
                .with_suggestion(format!(
                    "Add the sources of `{}` to the unit, or drop the import from `{}`",
                    dependency, package
                )),
            PlanError::NoMainPackage { .. } => Diagnostic::error(self.to_string())
                .with_suggestion("Add a file declaring `package main`")
                .with_suggestion("Or set kind = \"package\" for a library unit"),
            PlanError::DependencyCycle { .. } => Diagnostic::error(self.to_string())
                .with_suggestion("Move the shared code into a package both can import"),
        }
    }
}

/// Index of a task in a [`BuildGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub usize);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A build step in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildStep {
    /// Run the formatter over a unit's sources
    Format(FormatStep),
    /// Compile the files of one package into an object
    Compile(CompileStep),
    /// Pack one package object into an archive
    Archive(ArchiveStep),
    /// Link the `main` object into an executable
    Link(LinkStep),
}

/// A formatter pre-pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatStep {
    /// Files to format
    pub files: Vec<PathBuf>,
    /// Rewrite or list
    pub mode: FormatMode,
}

/// Compilation of one package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileStep {
    /// Source files, in registration order
    pub sources: Vec<PathBuf>,

    /// Output object file
    pub output: PathBuf,

    /// Package being compiled
    pub package: String,

    /// Import search directories
    pub include_dirs: Vec<PathBuf>,
}

/// A step to create a package archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStep {
    /// Object files to archive
    pub objects: Vec<PathBuf>,
    /// Output archive file
    pub output: PathBuf,
    /// Package this belongs to
    pub package: String,
    /// Outputs of other units this one was built against
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_inputs: Vec<PathBuf>,
}

/// A single link step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStep {
    /// Object files to link
    pub objects: Vec<PathBuf>,

    /// Output executable
    pub output: PathBuf,

    /// Library search paths
    pub lib_dirs: Vec<PathBuf>,

    /// Outputs of other units this one was built against
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_inputs: Vec<PathBuf>,
}

fn push_unique(list: &mut Vec<PathBuf>, path: &Path) {
    if !list.iter().any(|p| p == path) {
        list.push(path.to_path_buf());
    }
}

impl BuildStep {
    /// Short name of the step kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildStep::Format(_) => "format",
            BuildStep::Compile(_) => "compile",
            BuildStep::Archive(_) => "archive",
            BuildStep::Link(_) => "link",
        }
    }

    /// The artifact this step produces, if any.
    pub fn output(&self) -> Option<&Path> {
        match self {
            BuildStep::Format(_) => None,
            BuildStep::Compile(s) => Some(&s.output),
            BuildStep::Archive(s) => Some(&s.output),
            BuildStep::Link(s) => Some(&s.output),
        }
    }

    /// Render the command line for this step.
    pub fn command(&self, toolchain: &dyn Toolchain) -> CommandSpec {
        match self {
            BuildStep::Format(s) => toolchain.format_command(&s.files, s.mode),
            BuildStep::Compile(s) => toolchain.compile_command(&CompileInput {
                sources: s.sources.clone(),
                output: s.output.clone(),
                include_dirs: s.include_dirs.clone(),
            }),
            BuildStep::Archive(s) => toolchain.archive_command(&ArchiveInput {
                objects: s.objects.clone(),
                output: s.output.clone(),
            }),
            BuildStep::Link(s) => toolchain.link_command(&LinkInput {
                objects: s.objects.clone(),
                output: s.output.clone(),
                lib_dirs: s.lib_dirs.clone(),
            }),
        }
    }

    /// Append an import search directory to a compile step.
    pub fn add_include_dir(&mut self, dir: &Path) {
        if let BuildStep::Compile(s) = self {
            push_unique(&mut s.include_dirs, dir);
        }
    }

    /// Append a library search directory to a link step.
    pub fn add_lib_dir(&mut self, dir: &Path) {
        if let BuildStep::Link(s) = self {
            push_unique(&mut s.lib_dirs, dir);
        }
    }

    /// Record an extra input of a link or archive step.
    pub fn add_extra_input(&mut self, path: &Path) {
        match self {
            BuildStep::Archive(s) => push_unique(&mut s.extra_inputs, path),
            BuildStep::Link(s) => push_unique(&mut s.extra_inputs, path),
            _ => {}
        }
    }
}

/// A task: a step of one unit plus the tasks it must run after.
#[derive(Debug, Clone, Serialize)]
pub struct BuildTask {
    pub id: TaskId,
    pub unit: String,
    #[serde(flatten)]
    pub step: BuildStep,
    pub run_after: BTreeSet<TaskId>,
}

/// Arena of every task of one invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildGraph {
    tasks: Vec<BuildTask>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task and return its id.
    pub fn add(&mut self, unit: &str, step: BuildStep) -> TaskId {
        let id = TaskId(self.tasks.len());
        self.tasks.push(BuildTask {
            id,
            unit: unit.to_string(),
            step,
            run_after: BTreeSet::new(),
        });
        id
    }

    /// Make `task` run after `after`.
    pub fn add_edge(&mut self, task: TaskId, after: TaskId) {
        if task != after {
            self.tasks[task.0].run_after.insert(after);
        }
    }

    pub fn get(&self, id: TaskId) -> Option<&BuildTask> {
        self.tasks.get(id.0)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut BuildTask> {
        self.tasks.get_mut(id.0)
    }

    /// Output artifact of a task.
    pub fn output(&self, id: TaskId) -> Option<&Path> {
        self.get(id).and_then(|t| t.step.output())
    }

    pub fn tasks(&self) -> &[BuildTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Count tasks of one kind.
    pub fn count(&self, kind: &str) -> usize {
        self.tasks.iter().filter(|t| t.step.kind() == kind).count()
    }

    /// Group tasks into waves; every task runs after all tasks of earlier
    /// waves it depends on.
    ///
    /// Tasks caught in an ordering cycle are left out.
    pub fn waves(&self) -> Vec<Vec<TaskId>> {
        let mut remaining: Vec<usize> = self.tasks.iter().map(|t| t.run_after.len()).collect();
        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for task in &self.tasks {
            for &before in &task.run_after {
                dependents.entry(before).or_default().push(task.id);
            }
        }

        let mut current: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.run_after.is_empty())
            .map(|t| t.id)
            .collect();
        let mut waves = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for id in &current {
                for &dependent in dependents.get(id).into_iter().flatten() {
                    remaining[dependent.0] -= 1;
                    if remaining[dependent.0] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort();
            waves.push(std::mem::replace(&mut current, next));
        }

        waves
    }
}

/// The tasks created for one unit.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedUnit {
    pub name: String,
    pub kind: UnitKind,
    pub target: String,
    pub out_dir: PathBuf,

    /// Compile task per package
    pub compile: BTreeMap<String, TaskId>,

    /// Link task (programs only)
    pub link: Option<TaskId>,

    /// Archive task per package (packages only)
    pub archives: BTreeMap<String, TaskId>,

    /// Formatter pre-pass
    pub format: Option<TaskId>,
}

impl PlannedUnit {
    /// Tasks other units wait for: the archives if any, else the compiles.
    pub fn primary_tasks(&self) -> Vec<TaskId> {
        if self.archives.is_empty() {
            self.compile.values().copied().collect()
        } else {
            self.archives.values().copied().collect()
        }
    }

    /// Final tasks of the unit: the link, else the archives.
    pub fn terminal_tasks(&self) -> Vec<TaskId> {
        match self.link {
            Some(link) => vec![link],
            None => self.archives.values().copied().collect(),
        }
    }

    /// Outputs of the primary tasks.
    pub fn primary_outputs(&self, graph: &BuildGraph) -> Vec<PathBuf> {
        self.primary_tasks()
            .into_iter()
            .filter_map(|id| graph.output(id).map(Path::to_path_buf))
            .collect()
    }

    /// Outputs that get installed: the linked executable, or every archive
    /// so that an installed package can find the packages it imports.
    pub fn install_outputs<'g>(&self, graph: &'g BuildGraph) -> Vec<&'g Path> {
        self.terminal_tasks()
            .into_iter()
            .filter_map(|id| graph.output(id))
            .collect()
    }
}

/// Turns a unit's package registry into tasks.
#[derive(Debug, Clone)]
pub struct BuildGraphPlanner {
    object_ext: String,
    archive_ext: String,
}

impl BuildGraphPlanner {
    pub fn new(object_ext: impl Into<String>, archive_ext: impl Into<String>) -> Self {
        BuildGraphPlanner {
            object_ext: object_ext.into(),
            archive_ext: archive_ext.into(),
        }
    }

    /// Create the tasks of `unit` in `graph`.
    ///
    /// `registry` must have been through
    /// [`PackageRegistry::filter_dependencies`].
    pub fn plan(
        &self,
        unit: &UnitDecl,
        out_dir: &Path,
        registry: &PackageRegistry,
        format: Option<FormatMode>,
        graph: &mut BuildGraph,
    ) -> Result<PlannedUnit, PlanError> {
        let order = self.package_order(unit, registry)?;

        if unit.kind == UnitKind::Program && !registry.contains(MAIN_PACKAGE) {
            return Err(PlanError::NoMainPackage {
                unit: unit.name.clone(),
            });
        }

        let mut planned = PlannedUnit {
            name: unit.name.clone(),
            kind: unit.kind,
            target: unit.target.clone(),
            out_dir: out_dir.to_path_buf(),
            compile: BTreeMap::new(),
            link: None,
            archives: BTreeMap::new(),
            format: None,
        };

        if let Some(mode) = format {
            let files = registry
                .packages()
                .flat_map(|p| p.files.iter().map(|f| f.path().to_path_buf()))
                .collect();
            planned.format = Some(graph.add(&unit.name, BuildStep::Format(FormatStep { files, mode })));
        }

        for name in &order {
            let Some(package) = registry.get(name) else {
                continue;
            };

            let output = out_dir.join(format!("{}{}", registry.target_name(name), self.object_ext));
            let id = graph.add(
                &unit.name,
                BuildStep::Compile(CompileStep {
                    sources: package.files.iter().map(|f| f.path().to_path_buf()).collect(),
                    output,
                    package: name.clone(),
                    include_dirs: vec![out_dir.to_path_buf()],
                }),
            );

            for dep in &package.dependencies {
                if let Some(&dep_id) = planned.compile.get(dep) {
                    graph.add_edge(id, dep_id);
                }
            }
            if let (Some(format_id), Some(FormatMode::Write)) = (planned.format, format) {
                graph.add_edge(id, format_id);
            }

            tracing::debug!("{}: compile {} as task {}", unit.name, name, id);
            planned.compile.insert(name.clone(), id);
        }

        match unit.kind {
            UnitKind::Program => {
                let main = planned.compile[MAIN_PACKAGE];
                let objects = graph.output(main).map(Path::to_path_buf).into_iter().collect();
                let id = graph.add(
                    &unit.name,
                    BuildStep::Link(LinkStep {
                        objects,
                        output: out_dir.join(&unit.target),
                        lib_dirs: vec![out_dir.to_path_buf()],
                        extra_inputs: Vec::new(),
                    }),
                );
                graph.add_edge(id, main);
                planned.link = Some(id);
            }
            UnitKind::Package => {
                for (name, &compile_id) in &planned.compile {
                    let objects = graph
                        .output(compile_id)
                        .map(Path::to_path_buf)
                        .into_iter()
                        .collect();
                    let output = out_dir.join(format!(
                        "{}{}",
                        registry.target_name(name),
                        self.archive_ext
                    ));
                    let id = graph.add(
                        &unit.name,
                        BuildStep::Archive(ArchiveStep {
                            objects,
                            output,
                            package: name.clone(),
                            extra_inputs: Vec::new(),
                        }),
                    );
                    graph.add_edge(id, compile_id);
                    planned.archives.insert(name.clone(), id);
                }
            }
        }

        Ok(planned)
    }

    /// Packages in dependency order, after checking every edge.
    fn package_order(
        &self,
        unit: &UnitDecl,
        registry: &PackageRegistry,
    ) -> Result<Vec<String>, PlanError> {
        let mut deps: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for package in registry.packages() {
            nodes.insert(&package.name, deps.add_node(&package.name));
        }

        for package in registry.packages() {
            for dep in &package.dependencies {
                let Some(&from) = nodes.get(dep.as_str()) else {
                    return Err(PlanError::MissingPackage {
                        unit: unit.name.clone(),
                        package: package.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                deps.add_edge(from, nodes[package.name.as_str()], ());
            }
        }

        match toposort(&deps, None) {
            Ok(order) => Ok(order.into_iter().map(|n| deps[n].to_string()).collect()),
            Err(_) => {
                let mut cycle: Vec<String> = tarjan_scc(&deps)
                    .into_iter()
                    .find(|scc| scc.len() > 1 || deps.contains_edge(scc[0], scc[0]))
                    .unwrap_or_default()
                    .into_iter()
                    .map(|n| deps[n].to_string())
                    .collect();
                cycle.sort();
                Err(PlanError::DependencyCycle {
                    unit: unit.name.clone(),
                    cycle,
                })
            }
        }
    }
}
