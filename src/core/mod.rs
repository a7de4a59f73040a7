//! Core data structures for goplan.
//!
//! This module contains the foundational types used throughout goplan:
//! - Source files and build unit declarations
//! - The per-unit package registry
//! - Manifests and workspace management

pub mod manifest;
pub mod registry;
pub mod source;
pub mod unit;
pub mod workspace;

pub use manifest::{find_manifest, Manifest, ManifestError, MANIFEST_NAME};
pub use registry::{Package, PackageRegistry};
pub use source::SourceFile;
pub use unit::{FormatMode, UnitDecl, UnitKind};
pub use workspace::Workspace;
