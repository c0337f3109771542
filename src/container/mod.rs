//! Container Format Adapter
//!
//! A container is a packaged bundle of entries: symbol definitions, resources,
//! a manifest, and nested containers. The runtime never touches an archive
//! format directly; it goes through the [`Container`] trait.
//!
//! # Layout conventions
//! - `META-INF/MANIFEST.MF` - `Key: Value` attributes
//! - `modules/<name>/` - nested module containers
//! - `libs/<name>/` - nested library containers on a module's classpath
//! - `conf/provided.classes`, `conf/export.classes`, `conf/export.resources` - list files
//! - `a/b/C.class` - definition of symbol `a.b.C`
//!
//! # Adapters
//! - [`DirContainer`] - an unpacked directory tree
//! - [`MemContainer`] - an in-memory tree, used by tests and embedders
//!
//! # URLs
//! Nested containers are addressed as `{parent}!/{entry}`, so a module's URL
//! stays stable however deep it sits.

mod dir;
mod manifest;
mod memory;

pub use dir::{DirContainer, FsOpener};
pub use manifest::{parse_manifest, Attributes, MANIFEST_PATH};
pub use memory::{MemContainer, MemContainerBuilder, MemOpener};

use std::fmt;
use std::sync::Arc;

use crate::error::ContainerError;

/// Separator between a container URL and a nested entry.
pub const NESTED_SEPARATOR: &str = "!/";

/// Directory holding nested module containers.
pub const MODULES_DIR: &str = "modules/";

/// Directory holding nested library containers.
pub const LIBS_DIR: &str = "libs/";

/// Symbols the business namespace is expected to provide.
pub const PROVIDED_CLASSES_FILE: &str = "conf/provided.classes";

/// Symbol names published into the shared class table.
pub const EXPORTED_CLASSES_FILE: &str = "conf/export.classes";

/// Resource names published into the shared resource index.
pub const EXPORTED_RESOURCES_FILE: &str = "conf/export.resources";

/// Raw entry contents.
pub type Bytes = Arc<[u8]>;

/// Address of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerUrl(String);

impl ContainerUrl {
    pub fn new(url: impl Into<String>) -> Self {
        ContainerUrl(url.into())
    }

    /// URL of a directory on the local filesystem.
    pub fn from_path(path: &std::path::Path) -> Self {
        ContainerUrl(format!("file:{}", path.display()))
    }

    /// URL of a nested entry inside this container.
    pub fn nested(&self, entry: &str) -> Self {
        ContainerUrl(format!(
            "{}{}{}",
            self.0,
            NESTED_SEPARATOR,
            entry.trim_end_matches('/')
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path for `file:` URLs.
    pub fn file_path(&self) -> Option<std::path::PathBuf> {
        self.0
            .strip_prefix("file:")
            .filter(|p| !p.contains(NESTED_SEPARATOR))
            .map(std::path::PathBuf::from)
    }
}

impl fmt::Display for ContainerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerUrl {
    fn from(url: &str) -> Self {
        ContainerUrl::new(url)
    }
}

impl From<String> for ContainerUrl {
    fn from(url: String) -> Self {
        ContainerUrl(url)
    }
}

/// One entry of a container listing. Directory names end with `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entry {
    name: String,
    is_dir: bool,
}

impl Entry {
    pub fn file(name: impl Into<String>) -> Self {
        Entry {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        Entry { name, is_dir: true }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// A direct child directory of `modules/`.
    pub fn is_nested_module(&self) -> bool {
        self.is_direct_child_dir_of(MODULES_DIR)
    }

    /// A direct child directory of `libs/`.
    pub fn is_nested_library(&self) -> bool {
        self.is_direct_child_dir_of(LIBS_DIR)
    }

    fn is_direct_child_dir_of(&self, parent: &str) -> bool {
        if !self.is_dir {
            return false;
        }
        match self.name.strip_prefix(parent) {
            Some(rest) => {
                let rest = rest.trim_end_matches('/');
                !rest.is_empty() && !rest.contains('/')
            }
            None => false,
        }
    }
}

/// Location of a resource: the container that holds it plus the entry path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocation {
    container: ContainerUrl,
    path: String,
}

impl ResourceLocation {
    pub fn new(container: ContainerUrl, path: impl Into<String>) -> Self {
        ResourceLocation {
            container,
            path: path.into(),
        }
    }

    pub fn container(&self) -> &ContainerUrl {
        &self.container
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.container, NESTED_SEPARATOR, self.path)
    }
}

/// Read access to a packaged container.
pub trait Container: Send + Sync + fmt::Debug {
    fn url(&self) -> &ContainerUrl;

    /// Every entry, sorted by name.
    fn entries(&self) -> Result<Vec<Entry>, ContainerError>;

    /// Contents of a file entry, `None` when absent.
    fn read(&self, path: &str) -> Result<Option<Bytes>, ContainerError>;

    /// Open a nested container entry.
    fn nested(&self, entry: &Entry) -> Result<Arc<dyn Container>, ContainerError>;

    /// Manifest attributes; empty when the container has no manifest.
    fn attributes(&self) -> Result<Attributes, ContainerError>;

    fn list_entries(&self, filter: &dyn Fn(&Entry) -> bool) -> Result<Vec<Entry>, ContainerError> {
        Ok(self.entries()?.into_iter().filter(|e| filter(e)).collect())
    }

    fn nested_containers(
        &self,
        filter: &dyn Fn(&Entry) -> bool,
    ) -> Result<Vec<Arc<dyn Container>>, ContainerError> {
        self.list_entries(filter)?
            .iter()
            .map(|entry| self.nested(entry))
            .collect()
    }

    fn contains(&self, path: &str) -> Result<bool, ContainerError> {
        Ok(self.read(path)?.is_some())
    }

    fn resource(&self, path: &str) -> Result<Option<ResourceLocation>, ContainerError> {
        if self.contains(path)? {
            Ok(Some(ResourceLocation::new(self.url().clone(), path)))
        } else {
            Ok(None)
        }
    }

    /// Non-blank, trimmed lines of a UTF-8 list file.
    fn read_lines(&self, path: &str) -> Result<Option<Vec<String>>, ContainerError> {
        Ok(self.read(path)?.map(|bytes| {
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect()
        }))
    }
}

/// Turns a URL into an opened container.
pub trait ContainerOpener: Send + Sync {
    fn open(&self, url: &ContainerUrl) -> Result<Arc<dyn Container>, ContainerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_url() {
        let url = ContainerUrl::new("file:/opt/app");
        assert_eq!(url.nested("modules/rpc/").as_str(), "file:/opt/app!/modules/rpc");
        assert_eq!(
            url.nested("modules/rpc").nested("libs/core").as_str(),
            "file:/opt/app!/modules/rpc!/libs/core"
        );
    }

    #[test]
    fn test_file_path_only_for_plain_file_urls() {
        assert!(ContainerUrl::new("file:/opt/app").file_path().is_some());
        assert!(ContainerUrl::new("file:/opt/app!/modules/a").file_path().is_none());
        assert!(ContainerUrl::new("mem:app").file_path().is_none());
    }

    #[test]
    fn test_nested_module_entries() {
        assert!(Entry::dir("modules/rpc").is_nested_module());
        assert!(!Entry::dir("modules/").is_nested_module());
        assert!(!Entry::dir("modules/rpc/inner").is_nested_module());
        assert!(!Entry::file("modules/rpc").is_nested_module());
        assert!(Entry::dir("libs/core").is_nested_library());
        assert!(!Entry::dir("libs/core").is_nested_module());
    }

    #[test]
    fn test_resource_location_display() {
        let loc = ResourceLocation::new(ContainerUrl::new("mem:a"), "conf/app.properties");
        assert_eq!(loc.to_string(), "mem:a!/conf/app.properties");
    }
}
