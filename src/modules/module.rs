//! Module Structure
//!
//! A `Module` is one unit of isolation: a name, a kind, the containers on its
//! classpath, and (once linked) its namespace.

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::package::{ModuleDescriptor, DEFAULT_PRIORITY};
use crate::container::{Container, Entry};
use crate::error::ContainerError;
use crate::namespace::Namespace;

/// The role a module plays in the runtime.
///
/// The kind selects the resolution policy of the module's namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Host-provided platform symbols.
    Platform,
    /// The runtime's own framework symbols, packaged with the application container.
    Container,
    /// The application being hosted.
    Business,
    /// An isolated library module.
    Library,
    /// An instrumentation agent.
    Agent,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleKind::Platform => "platform",
            ModuleKind::Container => "container",
            ModuleKind::Business => "business",
            ModuleKind::Library => "library",
            ModuleKind::Agent => "agent",
        };
        f.write_str(s)
    }
}

/// A loaded module.
pub struct Module {
    name: String,
    kind: ModuleKind,
    priority: i32,
    /// Module archive for library and container modules.
    archive: Option<Arc<dyn Container>>,
    descriptor: Option<ModuleDescriptor>,
    /// Searched in order when defining symbols locally.
    classpath: Vec<Arc<dyn Container>>,
    namespace: OnceLock<Arc<Namespace>>,
}

impl Module {
    /// A library module. Its classpath is every `libs/*` container followed by
    /// the archive itself.
    pub fn library(
        descriptor: ModuleDescriptor,
        archive: Arc<dyn Container>,
    ) -> Result<Self, ContainerError> {
        let classpath = archive_classpath(&archive)?;
        Ok(Self {
            name: descriptor.name.clone(),
            kind: ModuleKind::Library,
            priority: descriptor.priority,
            archive: Some(archive),
            descriptor: Some(descriptor),
            classpath,
            namespace: OnceLock::new(),
        })
    }

    /// The container module, holding the runtime's framework symbols.
    pub fn container(name: &str, archive: Arc<dyn Container>) -> Result<Self, ContainerError> {
        let classpath = archive_classpath(&archive)?;
        Ok(Self::bare(name, ModuleKind::Container, Some(archive), classpath))
    }

    pub fn business(name: &str, classpath: Vec<Arc<dyn Container>>) -> Self {
        Self::bare(name, ModuleKind::Business, None, classpath)
    }

    /// An agent module, named `agent:{url}`.
    pub fn agent(container: Arc<dyn Container>) -> Self {
        let name = format!("agent:{}", container.url());
        Self::bare(&name, ModuleKind::Agent, None, vec![container])
    }

    pub fn platform(name: &str, classpath: Vec<Arc<dyn Container>>) -> Self {
        Self::bare(name, ModuleKind::Platform, None, classpath)
    }

    fn bare(
        name: &str,
        kind: ModuleKind,
        archive: Option<Arc<dyn Container>>,
        classpath: Vec<Arc<dyn Container>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            priority: DEFAULT_PRIORITY,
            archive,
            descriptor: None,
            classpath,
            namespace: OnceLock::new(),
        }
    }

    /// Get the module's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the module's kind.
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Get the module's priority (lower sorts first).
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Get the module archive, if any.
    pub fn archive(&self) -> Option<&Arc<dyn Container>> {
        self.archive.as_ref()
    }

    /// Get the descriptor of a library module.
    pub fn descriptor(&self) -> Option<&ModuleDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn classpath(&self) -> &[Arc<dyn Container>] {
        &self.classpath
    }

    /// Get the module's namespace once linked.
    pub fn namespace(&self) -> Option<&Arc<Namespace>> {
        self.namespace.get()
    }

    /// Attach the namespace. Returns `false` if one was already attached.
    pub fn attach_namespace(&self, namespace: Arc<Namespace>) -> bool {
        self.namespace.set(namespace).is_ok()
    }

    /// Only library modules can be uninstalled.
    pub fn is_destroyable(&self) -> bool {
        self.kind == ModuleKind::Library
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("classpath_len", &self.classpath.len())
            .field("linked", &self.namespace.get().is_some())
            .finish()
    }
}

fn archive_classpath(archive: &Arc<dyn Container>) -> Result<Vec<Arc<dyn Container>>, ContainerError> {
    let mut classpath = archive.nested_containers(&|e: &Entry| e.is_nested_library())?;
    classpath.push(Arc::clone(archive));
    Ok(classpath)
}
