//! High-level operations.
//!
//! This module contains the implementation of goplan commands.

pub mod goplan_build;
pub mod goplan_clean;

pub use goplan_build::{build, scan, BuildOptions, BuildResult, BuildSession};
pub use goplan_clean::clean;
