//! Module System Infrastructure
//!
//! This module provides the core types for discovering and tracking modules:
//! - `ModuleDescriptor` - Manifest attributes and list files of a library module
//! - `Module` / `ModuleKind` - A loaded module and the role it plays
//! - `ModuleRegistry` - Registry of loaded library modules, unique by name
//! - `MergeEngine` - Discovery and de-duplication across module sources
//! - Symbol name and package prefix utilities

mod loader;
mod merge;
mod module;
mod package;
pub mod path;

pub use loader::ModuleRegistry;
pub use merge::{Candidate, Candidates, DiscoveredModule, MergeEngine, ModuleSource};
pub use module::{Module, ModuleKind};
pub use package::{
    ExportInfo, ImportInfo, ModuleDescriptor, DEFAULT_PRIORITY, EXPORT_CLASSES, EXPORT_CONTAINERS,
    EXPORT_PACKAGES, IMPORT_CLASSES, IMPORT_PACKAGES, IMPORT_RESOURCES, LOAD_FROM_OWNER,
    MODULE_DESCRIPTION, MODULE_NAME, MODULE_PRIORITY, MODULE_VERSION,
};
pub use path::{class_entry_path, matches_package, package_prefixes, parent_package};
