//! Build graph construction and execution.
//!
//! This module turns scanned packages into compile, link, and archive
//! tasks for the gc toolchain, and runs them.

pub mod context;
pub mod cross_unit;
pub mod executor;
pub mod install;
pub mod plan;
pub mod toolchain;

pub use context::BuildContext;
pub use cross_unit::{LinkError, SiblingUnit};
pub use executor::BuildExecutor;
pub use install::InstallPublisher;
pub use plan::{BuildGraph, BuildGraphPlanner, BuildStep, BuildTask, PlanError, PlannedUnit, TaskId};
pub use toolchain::{detect_toolchain, CommandSpec, GcToolchain, Toolchain};
