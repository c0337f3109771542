//! Module Descriptors
//!
//! A library module describes itself through manifest attributes plus a few
//! list files under `conf/`.
//!
//! ## Manifest attributes
//!
//! ```text
//! Module-Name: rpc
//! Module-Priority: 20
//! Module-Version: 1.4.2
//! Export-Classes: com.acme.rpc.Client
//! Export-Packages: com.acme.rpc.api, com.acme.rpc.spi
//! Import-Classes: com.biz.Config
//! Import-Packages: com.biz.model
//! Import-Resources: app.properties
//! Load-From-Owner: true
//! ```
//!
//! ## List files
//!
//! - `conf/provided.classes` - symbols the business namespace must provide
//! - `conf/export.classes` - symbols published into the shared class table
//! - `conf/export.resources` - resources published into the shared resource index

use tracing::trace;

use super::path::{matches_any, normalize_package};
use crate::container::{Container, PROVIDED_CLASSES_FILE};
use crate::error::DescriptorError;

pub const MODULE_NAME: &str = "Module-Name";
pub const MODULE_PRIORITY: &str = "Module-Priority";
pub const MODULE_VERSION: &str = "Module-Version";
pub const MODULE_DESCRIPTION: &str = "Module-Description";
pub const EXPORT_CLASSES: &str = "Export-Classes";
pub const EXPORT_PACKAGES: &str = "Export-Packages";
pub const EXPORT_CONTAINERS: &str = "Export-Containers";
pub const IMPORT_CLASSES: &str = "Import-Classes";
pub const IMPORT_PACKAGES: &str = "Import-Packages";
pub const IMPORT_RESOURCES: &str = "Import-Resources";
pub const LOAD_FROM_OWNER: &str = "Load-From-Owner";

/// Priority of modules that do not declare one. Lower sorts first.
pub const DEFAULT_PRIORITY: i32 = 100;

/// What a module publishes to its siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportInfo {
    /// Exact symbol names from `Export-Classes`.
    pub classes: Vec<String>,
    /// Package prefixes from `Export-Packages`.
    pub packages: Vec<String>,
    /// Entry names of nested containers listed in `Export-Containers`.
    pub containers: Vec<String>,
}

/// What a module may take from the business namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportInfo {
    pub classes: Vec<String>,
    pub packages: Vec<String>,
    pub resources: Vec<String>,
    /// Whether imports and the owner fallback are consulted at all.
    pub load_from_owner: bool,
    /// Host-wide flag carried for embedders; resolution always consults the
    /// platform namespace regardless.
    pub load_from_system: bool,
}

impl ImportInfo {
    /// Declared class or package import for `name`.
    pub fn imports_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c == name) || matches_any(name, &self.packages)
    }

    /// Declared resource import for `name` (exact match).
    pub fn imports_resource(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r == name)
    }
}

/// Descriptor of a library module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub name: String,
    pub priority: i32,
    pub version: Option<String>,
    pub description: Option<String>,
    pub export: ExportInfo,
    pub import: ImportInfo,
    /// Contents of `conf/provided.classes`.
    pub provided: Vec<String>,
}

impl ModuleDescriptor {
    /// Minimal descriptor with defaults for everything but the name.
    pub fn new(name: impl Into<String>) -> Self {
        ModuleDescriptor {
            name: name.into(),
            priority: DEFAULT_PRIORITY,
            version: None,
            description: None,
            export: ExportInfo::default(),
            import: ImportInfo::default(),
            provided: Vec::new(),
        }
    }

    /// Read only the module name. Fails on a blank or missing `Module-Name`.
    pub fn module_name(container: &dyn Container) -> Result<String, DescriptorError> {
        let attrs = container
            .attributes()
            .map_err(|source| DescriptorError::Manifest {
                url: container.url().clone(),
                source,
            })?;
        attrs
            .get(MODULE_NAME)
            .map(String::from)
            .ok_or_else(|| DescriptorError::MissingName(container.url().clone()))
    }

    /// Read the full descriptor of a module container.
    pub fn read(container: &dyn Container) -> Result<Self, DescriptorError> {
        let url = container.url().clone();
        let attrs = container
            .attributes()
            .map_err(|source| DescriptorError::Manifest {
                url: url.clone(),
                source,
            })?;
        let name = attrs
            .get(MODULE_NAME)
            .map(String::from)
            .ok_or(DescriptorError::MissingName(url))?;

        let priority = match attrs.get(MODULE_PRIORITY) {
            Some(value) => value
                .parse::<i32>()
                .map_err(|_| DescriptorError::InvalidPriority {
                    module: name.clone(),
                    value: value.to_string(),
                })?,
            None => DEFAULT_PRIORITY,
        };

        let packages = |key: &str| -> Vec<String> {
            attrs
                .list(key)
                .iter()
                .filter_map(|p| normalize_package(p))
                .collect()
        };

        let export = ExportInfo {
            classes: attrs.list(EXPORT_CLASSES),
            packages: packages(EXPORT_PACKAGES),
            containers: attrs.list(EXPORT_CONTAINERS),
        };
        let import = ImportInfo {
            classes: attrs.list(IMPORT_CLASSES),
            packages: packages(IMPORT_PACKAGES),
            resources: attrs.list(IMPORT_RESOURCES),
            load_from_owner: attrs.flag(LOAD_FROM_OWNER),
            load_from_system: false,
        };

        let provided = container
            .read_lines(PROVIDED_CLASSES_FILE)
            .map_err(|source| DescriptorError::ListFile {
                module: name.clone(),
                path: PROVIDED_CLASSES_FILE,
                source,
            })?
            .unwrap_or_default();

        trace!(
            module = %name,
            priority,
            exports = export.classes.len() + export.packages.len(),
            provided = provided.len(),
            "read module descriptor"
        );

        Ok(ModuleDescriptor {
            name,
            priority,
            version: attrs.get(MODULE_VERSION).map(String::from),
            description: attrs.get(MODULE_DESCRIPTION).map(String::from),
            export,
            import,
            provided,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemContainer;

    #[test]
    fn test_read_full_descriptor() {
        let container = MemContainer::builder()
            .module_name("rpc")
            .attribute(MODULE_PRIORITY, "20")
            .attribute(MODULE_VERSION, "1.4.2")
            .attribute(EXPORT_CLASSES, "com.acme.rpc.Client")
            .attribute(EXPORT_PACKAGES, "com.acme.rpc.api, com.acme.rpc.spi.*")
            .attribute(IMPORT_PACKAGES, "com.biz.model")
            .attribute(IMPORT_RESOURCES, "app.properties")
            .attribute(LOAD_FROM_OWNER, "true")
            .lines(PROVIDED_CLASSES_FILE, &["com.biz.Foo", "", "com.biz.Bar"])
            .build("mem:rpc");

        let d = ModuleDescriptor::read(container.as_ref()).unwrap();
        assert_eq!(d.name, "rpc");
        assert_eq!(d.priority, 20);
        assert_eq!(d.version.as_deref(), Some("1.4.2"));
        assert_eq!(d.export.classes, vec!["com.acme.rpc.Client"]);
        assert_eq!(d.export.packages, vec!["com.acme.rpc.api", "com.acme.rpc.spi"]);
        assert!(d.import.load_from_owner);
        assert!(d.import.imports_class("com.biz.model.Order"));
        assert!(!d.import.imports_class("com.biz.Other"));
        assert!(d.import.imports_resource("app.properties"));
        assert_eq!(d.provided, vec!["com.biz.Foo", "com.biz.Bar"]);
    }

    #[test]
    fn test_defaults() {
        let container = MemContainer::builder().module_name("plain").build("mem:plain");
        let d = ModuleDescriptor::read(container.as_ref()).unwrap();
        assert_eq!(d.priority, DEFAULT_PRIORITY);
        assert!(!d.import.load_from_owner);
        assert!(d.provided.is_empty());
        assert_eq!(d, ModuleDescriptor::new("plain"));
    }

    #[test]
    fn test_missing_name_is_fatal() {
        let container = MemContainer::builder()
            .attribute(MODULE_PRIORITY, "1")
            .build("mem:anon");
        let err = ModuleDescriptor::read(container.as_ref()).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingName(_)));
        assert!(ModuleDescriptor::module_name(container.as_ref()).is_err());
    }

    #[test]
    fn test_blank_name_is_fatal() {
        let container = MemContainer::builder().module_name("   ").build("mem:blank");
        assert!(matches!(
            ModuleDescriptor::read(container.as_ref()),
            Err(DescriptorError::MissingName(_))
        ));
    }

    #[test]
    fn test_bad_priority() {
        let container = MemContainer::builder()
            .module_name("x")
            .attribute(MODULE_PRIORITY, "high")
            .build("mem:x");
        let err = ModuleDescriptor::read(container.as_ref()).unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }
}
