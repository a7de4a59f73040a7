//! Dependencies between build units and on external libraries.
//!
//! A unit lists sibling units in `usepkg-local`. Those are planned first;
//! the consumer then searches their output directories and waits for
//! their tasks. Libraries named in `usepkg` only contribute search paths.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::PathBuf;

use thiserror::Error;

use crate::builder::plan::{BuildGraph, PlannedUnit, TaskId};
use crate::core::unit::UnitDecl;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error while resolving dependencies between units.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("unit `{name}` required by `{required_by}` is not declared")]
    UnitNotFound { name: String, required_by: String },

    #[error("units depend on each other: {}", .cycle.join(" -> "))]
    UnitCycle { cycle: Vec<String> },
}

impl LinkError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            LinkError::UnitNotFound { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(suggestions::UNIT_NOT_FOUND)
                .with_suggestion("Or remove it from `usepkg-local`"),
            LinkError::UnitCycle { .. } => Diagnostic::error(self.to_string())
                .with_suggestion("Break the cycle by moving shared packages into their own unit"),
        }
    }
}

/// What a consumer needs from a planned sibling unit.
#[derive(Debug, Clone)]
pub struct SiblingUnit {
    pub name: String,

    /// Directory holding the sibling's objects and archives
    pub out_dir: PathBuf,

    /// Tasks the consumer's compiles wait for
    pub primary_tasks: Vec<TaskId>,

    /// Artifacts of those tasks
    pub primary_outputs: Vec<PathBuf>,

    /// The sibling's own `usepkg-local` list
    pub usepkg_local: Vec<String>,
}

impl SiblingUnit {
    /// Summarize a unit that has been planned into `graph`.
    pub fn from_planned(decl: &UnitDecl, planned: &PlannedUnit, graph: &BuildGraph) -> Self {
        SiblingUnit {
            name: planned.name.clone(),
            out_dir: planned.out_dir.clone(),
            primary_tasks: planned.primary_tasks(),
            primary_outputs: planned.primary_outputs(graph),
            usepkg_local: decl.usepkg_local.clone(),
        }
    }
}

/// Collect every sibling reachable from `root` through `usepkg-local`.
///
/// Traversal is breadth first and each name is passed to `lookup` at most
/// once, together with the name of the unit that asked for it. `lookup`
/// is expected to plan the sibling if that has not happened yet.
pub fn collect_local<F, E>(root: &UnitDecl, mut lookup: F) -> Result<Vec<SiblingUnit>, E>
where
    F: FnMut(&str, &str) -> Result<SiblingUnit, E>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, String)> = VecDeque::new();
    let mut found = Vec::new();

    seen.insert(root.name.clone());
    for name in &root.usepkg_local {
        if seen.insert(name.clone()) {
            queue.push_back((name.clone(), root.name.clone()));
        }
    }

    while let Some((name, required_by)) = queue.pop_front() {
        let sibling = lookup(&name, &required_by)?;

        for next in &sibling.usepkg_local {
            if seen.insert(next.clone()) {
                queue.push_back((next.clone(), sibling.name.clone()));
            }
        }

        found.push(sibling);
    }

    Ok(found)
}

/// Wire `consumer` to its sibling units.
pub fn apply_local(graph: &mut BuildGraph, consumer: &PlannedUnit, siblings: &[SiblingUnit]) {
    let compiles: Vec<TaskId> = consumer.compile.values().copied().collect();
    let terminals = consumer.terminal_tasks();

    for sibling in siblings {
        tracing::debug!("{}: uses local unit `{}`", consumer.name, sibling.name);

        for &id in &compiles {
            if let Some(task) = graph.get_mut(id) {
                task.step.add_include_dir(&sibling.out_dir);
            }
            for &producer in &sibling.primary_tasks {
                graph.add_edge(id, producer);
            }
        }

        for &id in &terminals {
            if let Some(task) = graph.get_mut(id) {
                task.step.add_lib_dir(&sibling.out_dir);
                for output in &sibling.primary_outputs {
                    task.step.add_extra_input(output);
                }
            }
        }
    }
}

/// Add search paths for the named external libraries.
///
/// Names without an entry in `libraries` are skipped.
pub fn apply_external(
    graph: &mut BuildGraph,
    consumer: &PlannedUnit,
    usepkg: &[String],
    libraries: &BTreeMap<String, PathBuf>,
) {
    let mut targets: Vec<TaskId> = consumer.compile.values().copied().collect();
    targets.extend(consumer.link);

    for name in usepkg {
        let Some(dir) = libraries.get(name) else {
            tracing::debug!("{}: library `{}` is not registered, skipping", consumer.name, name);
            continue;
        };

        for &id in &targets {
            if let Some(task) = graph.get_mut(id) {
                task.step.add_include_dir(dir);
                task.step.add_lib_dir(dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::plan::{BuildGraphPlanner, BuildStep};
    use crate::core::registry::PackageRegistry;
    use crate::core::source::SourceFile;
    use crate::core::unit::UnitKind;
    use crate::scanner::ParsedUnit;
    use std::collections::{BTreeSet, HashMap};
    use std::path::Path;

    fn plan_unit(graph: &mut BuildGraph, decl: &UnitDecl, packages: &[(&str, &str)]) -> PlannedUnit {
        let mut registry = PackageRegistry::new(&decl.target);
        for (package, imports) in packages {
            registry.register(
                ParsedUnit {
                    package: package.to_string(),
                    imports: imports.split_whitespace().map(str::to_string).collect(),
                },
                SourceFile::new(Path::new("/ws"), format!("/ws/{}/{}.go", decl.name, package)),
            );
        }
        registry.filter_dependencies();

        BuildGraphPlanner::new(".6", ".a")
            .plan(
                decl,
                &Path::new("/out").join(&decl.name),
                &registry,
                None,
                graph,
            )
            .unwrap()
    }

    #[test]
    fn test_collect_local_visits_diamond_once() {
        // app -> (left, right) -> base
        let decls: HashMap<String, UnitDecl> = [
            UnitDecl::new("app", UnitKind::Program, "app").with_local_deps(["left", "right"]),
            UnitDecl::new("left", UnitKind::Package, "left").with_local_deps(["base"]),
            UnitDecl::new("right", UnitKind::Package, "right").with_local_deps(["base"]),
            UnitDecl::new("base", UnitKind::Package, "base"),
        ]
        .into_iter()
        .map(|d| (d.name.clone(), d))
        .collect();

        let mut calls = Vec::new();
        let found = collect_local(&decls["app"], |name, required_by| {
            calls.push((name.to_string(), required_by.to_string()));
            let decl = &decls[name];
            Ok::<_, LinkError>(SiblingUnit {
                name: decl.name.clone(),
                out_dir: PathBuf::from("/out").join(name),
                primary_tasks: Vec::new(),
                primary_outputs: Vec::new(),
                usepkg_local: decl.usepkg_local.clone(),
            })
        })
        .unwrap();

        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["left", "right", "base"]);
        assert_eq!(
            calls,
            vec![
                ("left".to_string(), "app".to_string()),
                ("right".to_string(), "app".to_string()),
                ("base".to_string(), "left".to_string()),
            ]
        );
    }

    #[test]
    fn test_collect_local_propagates_lookup_errors() {
        let app = UnitDecl::new("app", UnitKind::Program, "app").with_local_deps(["ghost"]);

        let err = collect_local(&app, |name, required_by| {
            Err::<SiblingUnit, _>(LinkError::UnitNotFound {
                name: name.to_string(),
                required_by: required_by.to_string(),
            })
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "unit `ghost` required by `app` is not declared");
    }

    #[test]
    fn test_apply_local_adds_paths_and_edges_once() {
        let mut graph = BuildGraph::new();

        let base_decl = UnitDecl::new("base", UnitKind::Package, "base");
        let base = plan_unit(&mut graph, &base_decl, &[("base", "")]);
        let base_sibling = SiblingUnit::from_planned(&base_decl, &base, &graph);

        let app_decl = UnitDecl::new("app", UnitKind::Program, "app").with_local_deps(["base"]);
        let app = plan_unit(&mut graph, &app_decl, &[("main", "base")]);

        // the same sibling reached twice, as through a diamond
        apply_local(&mut graph, &app, &[base_sibling.clone(), base_sibling]);

        let main = graph.get(app.compile["main"]).unwrap();
        match &main.step {
            BuildStep::Compile(s) => assert_eq!(
                s.include_dirs,
                vec![PathBuf::from("/out/app"), PathBuf::from("/out/base")]
            ),
            other => panic!("unexpected step {}", other.kind()),
        }
        assert_eq!(main.run_after, BTreeSet::from([base.archives["base"]]));

        match &graph.get(app.link.unwrap()).unwrap().step {
            BuildStep::Link(s) => {
                assert_eq!(s.lib_dirs, vec![PathBuf::from("/out/app"), PathBuf::from("/out/base")]);
                assert_eq!(s.extra_inputs, vec![PathBuf::from("/out/base/base.a")]);
            }
            other => panic!("unexpected step {}", other.kind()),
        }
    }

    #[test]
    fn test_apply_external_only_uses_registered_libraries() {
        let mut graph = BuildGraph::new();
        let decl = UnitDecl::new("app", UnitKind::Program, "app");
        let app = plan_unit(&mut graph, &decl, &[("main", "sqlite")]);

        let libraries = BTreeMap::from([("sqlite".to_string(), PathBuf::from("/opt/sqlite"))]);
        apply_external(
            &mut graph,
            &app,
            &["sqlite".to_string(), "unknown".to_string()],
            &libraries,
        );

        match &graph.get(app.compile["main"]).unwrap().step {
            BuildStep::Compile(s) => assert_eq!(
                s.include_dirs,
                vec![PathBuf::from("/out/app"), PathBuf::from("/opt/sqlite")]
            ),
            other => panic!("unexpected step {}", other.kind()),
        }
        match &graph.get(app.link.unwrap()).unwrap().step {
            BuildStep::Link(s) => assert_eq!(
                s.lib_dirs,
                vec![PathBuf::from("/out/app"), PathBuf::from("/opt/sqlite")]
            ),
            other => panic!("unexpected step {}", other.kind()),
        }
    }
}
