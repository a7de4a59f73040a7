//! Package registry for one build unit.
//!
//! Scanned files are folded into named packages here. Once every file is
//! registered, [`PackageRegistry::filter_dependencies`] reduces each
//! package's raw imports to the packages that exist in the same unit; all
//! other imports are external and play no part in task ordering.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::source::SourceFile;
use crate::scanner::ParsedUnit;

/// Name of the package an executable is linked from.
pub const MAIN_PACKAGE: &str = "main";

/// A package: the files that declare it and the packages it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,

    /// Files in registration order
    pub files: Vec<SourceFile>,

    /// Imports of every file, deduplicated, in first-seen order
    pub imports: Vec<String>,

    /// Imports that name another package of the same registry
    pub dependencies: BTreeSet<String>,
}

impl Package {
    fn new(name: &str) -> Self {
        Package {
            name: name.to_string(),
            files: Vec::new(),
            imports: Vec::new(),
            dependencies: BTreeSet::new(),
        }
    }
}

/// Packages of one build unit, keyed by name.
#[derive(Debug, Clone)]
pub struct PackageRegistry {
    unit_target: String,
    packages: BTreeMap<String, Package>,
}

impl PackageRegistry {
    /// Create an empty registry for a unit whose output is named
    /// `unit_target`.
    pub fn new(unit_target: impl Into<String>) -> Self {
        PackageRegistry {
            unit_target: unit_target.into(),
            packages: BTreeMap::new(),
        }
    }

    /// Fold one scanned file into its package.
    ///
    /// Registering a file that is already part of the package is a no-op.
    pub fn register(&mut self, parsed: ParsedUnit, file: SourceFile) {
        let package = self
            .packages
            .entry(parsed.package.clone())
            .or_insert_with(|| Package::new(&parsed.package));

        if package.files.contains(&file) {
            return;
        }
        package.files.push(file);

        for import in parsed.imports {
            if !package.imports.contains(&import) {
                package.imports.push(import);
            }
        }
    }

    /// Keep only the imports that name another package of this registry.
    ///
    /// Calling this more than once yields the same dependency sets.
    pub fn filter_dependencies(&mut self) {
        let known: BTreeSet<String> = self.packages.keys().cloned().collect();

        for package in self.packages.values_mut() {
            let mut deps = BTreeSet::new();
            for import in &package.imports {
                if import == &package.name {
                    continue;
                }
                if known.contains(import) {
                    deps.insert(import.clone());
                } else {
                    tracing::debug!("package `{}`: `{}` is external", package.name, import);
                }
            }
            package.dependencies = deps;
        }
    }

    /// Output base name for a package: the unit's target for `main`, the
    /// package name otherwise.
    pub fn target_name<'a>(&'a self, package: &'a str) -> &'a str {
        if package == MAIN_PACKAGE {
            &self.unit_target
        } else {
            package
        }
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Package> {
        self.packages.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Iterate over packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parsed(package: &str, imports: &[&str]) -> ParsedUnit {
        ParsedUnit {
            package: package.to_string(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn file(name: &str) -> SourceFile {
        SourceFile::new(Path::new("/ws"), Path::new("/ws").join(name))
    }

    #[test]
    fn test_register_groups_files_by_package() {
        let mut registry = PackageRegistry::new("foo");
        registry.register(parsed("foo", &["fmt"]), file("foo.go"));
        registry.register(parsed("foo", &["os", "fmt"]), file("foo2.go"));

        assert_eq!(registry.len(), 1);
        let foo = registry.get("foo").unwrap();
        assert_eq!(foo.files, vec![file("foo.go"), file("foo2.go")]);
        assert_eq!(foo.imports, vec!["fmt", "os"]);
    }

    #[test]
    fn test_register_same_file_twice_is_noop() {
        let mut registry = PackageRegistry::new("foo");
        registry.register(parsed("foo", &["fmt"]), file("foo.go"));
        registry.register(parsed("foo", &["fmt"]), file("foo.go"));

        assert_eq!(registry.get("foo").unwrap().files.len(), 1);
    }

    #[test]
    fn test_filter_keeps_only_known_packages() {
        let mut registry = PackageRegistry::new("bar");
        registry.register(parsed("main", &["fmt", "util", "main"]), file("main.go"));
        registry.register(parsed("util", &["strings"]), file("util/util.go"));
        registry.filter_dependencies();

        let main = registry.get("main").unwrap();
        assert_eq!(main.dependencies.iter().collect::<Vec<_>>(), vec!["util"]);
        assert!(registry.get("util").unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut registry = PackageRegistry::new("bar");
        registry.register(parsed("a", &["b", "c", "fmt"]), file("a.go"));
        registry.register(parsed("b", &["c"]), file("b.go"));
        registry.register(parsed("c", &[]), file("c.go"));

        registry.filter_dependencies();
        let first: Vec<_> = registry.packages().map(|p| p.dependencies.clone()).collect();
        registry.filter_dependencies();
        let second: Vec<_> = registry.packages().map(|p| p.dependencies.clone()).collect();

        assert_eq!(first, second);
        assert_eq!(
            registry.get("a").unwrap().dependencies,
            BTreeSet::from(["b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_target_name() {
        let registry = PackageRegistry::new("bar");
        assert_eq!(registry.target_name("main"), "bar");
        assert_eq!(registry.target_name("foo"), "foo");
    }
}
