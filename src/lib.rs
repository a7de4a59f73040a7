//! goplan - package-aware build planning for the gc Go toolchain
//!
//! This crate discovers the package and imports of each source file,
//! groups files into packages, and turns the package graph of every build
//! unit into an ordered graph of compile, link, and archive tasks.

pub mod builder;
pub mod core;
pub mod ops;
pub mod scanner;
pub mod util;

pub use builder::{BuildGraph, BuildGraphPlanner, BuildStep, PlanError};
pub use core::{Manifest, PackageRegistry, SourceFile, UnitDecl, Workspace};
pub use scanner::{ParsedUnit, ScanError, SourceScanner};
pub use util::{ConfigError, GoEnv};
