//! In-memory containers
//!
//! Built with [`MemContainerBuilder`]; nested containers get their URL from
//! the parent, so a whole application can be assembled in one expression.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::{Attributes, Bytes, Container, ContainerOpener, ContainerUrl, Entry, MANIFEST_PATH};
use crate::error::ContainerError;
use crate::modules::path::class_entry_path;

/// An immutable in-memory container.
#[derive(Debug)]
pub struct MemContainer {
    url: ContainerUrl,
    files: BTreeMap<String, Bytes>,
    nested: BTreeMap<String, Arc<MemContainer>>,
    attributes: Attributes,
}

impl MemContainer {
    pub fn builder() -> MemContainerBuilder {
        MemContainerBuilder::default()
    }
}

impl Container for MemContainer {
    fn url(&self) -> &ContainerUrl {
        &self.url
    }

    fn entries(&self) -> Result<Vec<Entry>, ContainerError> {
        let mut entries: Vec<Entry> = self
            .files
            .keys()
            .map(|name| Entry::file(name.clone()))
            .chain(self.nested.keys().map(|name| Entry::dir(name.clone())))
            .collect();
        if !self.attributes.is_empty() && !self.files.contains_key(MANIFEST_PATH) {
            entries.push(Entry::file(MANIFEST_PATH));
        }
        entries.sort();
        Ok(entries)
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, ContainerError> {
        Ok(self.files.get(path).cloned())
    }

    fn nested(&self, entry: &Entry) -> Result<Arc<dyn Container>, ContainerError> {
        match self.nested.get(entry.name()) {
            Some(child) => Ok(Arc::clone(child) as Arc<dyn Container>),
            None => Err(ContainerError::NestedNotFound {
                container: self.url.clone(),
                entry: entry.name().to_string(),
            }),
        }
    }

    fn attributes(&self) -> Result<Attributes, ContainerError> {
        Ok(self.attributes.clone())
    }
}

/// Builder for [`MemContainer`].
#[derive(Debug, Default)]
pub struct MemContainerBuilder {
    files: BTreeMap<String, Bytes>,
    nested: BTreeMap<String, MemContainerBuilder>,
    attributes: Attributes,
}

impl MemContainerBuilder {
    /// Set a manifest attribute.
    pub fn attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Shorthand for the `Module-Name` attribute.
    pub fn module_name(self, name: &str) -> Self {
        self.attribute("Module-Name", name)
    }

    pub fn file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files
            .insert(path.to_string(), Bytes::from(contents.into()));
        self
    }

    /// Define symbol `name` with the given bytes.
    pub fn symbol(self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.file(&class_entry_path(name), contents)
    }

    /// A list file, one item per line.
    pub fn lines(self, path: &str, items: &[&str]) -> Self {
        self.file(path, items.join("\n"))
    }

    /// Nest a container at `entry` (e.g. `modules/rpc` or `libs/core`).
    pub fn nested(mut self, entry: &str, child: MemContainerBuilder) -> Self {
        let mut name = entry.trim_end_matches('/').to_string();
        name.push('/');
        self.nested.insert(name, child);
        self
    }

    pub fn build(self, url: impl Into<ContainerUrl>) -> Arc<MemContainer> {
        Arc::new(self.build_at(url.into()))
    }

    fn build_at(self, url: ContainerUrl) -> MemContainer {
        let nested = self
            .nested
            .into_iter()
            .map(|(name, child)| {
                let child_url = url.nested(&name);
                (name, Arc::new(child.build_at(child_url)))
            })
            .collect();
        MemContainer {
            url,
            files: self.files,
            nested,
            attributes: self.attributes,
        }
    }
}

/// Opens containers registered ahead of time by URL.
#[derive(Debug, Default)]
pub struct MemOpener {
    containers: DashMap<ContainerUrl, Arc<dyn Container>>,
}

impl MemOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container under its own URL.
    pub fn register(&self, container: Arc<dyn Container>) -> ContainerUrl {
        let url = container.url().clone();
        self.containers.insert(url.clone(), container);
        url
    }
}

impl ContainerOpener for MemOpener {
    fn open(&self, url: &ContainerUrl) -> Result<Arc<dyn Container>, ContainerError> {
        self.containers
            .get(url)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| ContainerError::NotFound(url.clone()))
    }
}
