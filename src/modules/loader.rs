//! Module Registry
//!
//! Tracks every loaded library module by name. Names are unique; the
//! registry is shared between the boot sequence and dynamic install, so all
//! operations take `&self`.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::module::Module;
use crate::error::RuntimeError;

/// Registry of loaded modules keyed by name.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: DashMap<String, Arc<Module>>,
}

impl ModuleRegistry {
    /// Create a new empty module registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. A second module with the same name is rejected.
    pub fn load(&self, module: Arc<Module>) -> Result<Arc<Module>, RuntimeError> {
        match self.modules.entry(module.name().to_string()) {
            MapEntry::Occupied(_) => Err(RuntimeError::DuplicateModule(module.name().to_string())),
            MapEntry::Vacant(slot) => {
                debug!(module = %module.name(), kind = %module.kind(), "module registered");
                slot.insert(Arc::clone(&module));
                Ok(module)
            }
        }
    }

    /// Get a module by name.
    pub fn get(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.get(name).map(|m| Arc::clone(m.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Module>> {
        let removed = self.modules.remove(name).map(|(_, m)| m);
        if removed.is_some() {
            info!(module = name, "module removed from registry");
        }
        removed
    }

    /// All modules ordered by priority, then name.
    pub fn all(&self) -> Vec<Arc<Module>> {
        let mut modules: Vec<Arc<Module>> =
            self.modules.iter().map(|m| Arc::clone(m.value())).collect();
        modules.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        modules
    }

    /// Module names in the same order as [`ModuleRegistry::all`].
    pub fn names(&self) -> Vec<String> {
        self.all().iter().map(|m| m.name().to_string()).collect()
    }

    /// Get the number of loaded modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn clear(&self) {
        self.modules.clear();
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemContainer;
    use crate::modules::ModuleDescriptor;

    fn library(name: &str, priority: i32) -> Arc<Module> {
        let mut descriptor = ModuleDescriptor::new(name);
        descriptor.priority = priority;
        let archive = MemContainer::builder()
            .module_name(name)
            .build(format!("mem:{}", name));
        Arc::new(Module::library(descriptor, archive).unwrap())
    }

    #[test]
    fn test_registry_new() {
        let registry = ModuleRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = ModuleRegistry::new();
        registry.load(library("rpc", 1)).unwrap();
        let err = registry.load(library("rpc", 2)).unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateModule(ref n) if n == "rpc"));
        assert_eq!(registry.get("rpc").unwrap().priority(), 1);
    }

    #[test]
    fn test_ordering_by_priority_then_name() {
        let registry = ModuleRegistry::new();
        registry.load(library("zeta", 1)).unwrap();
        registry.load(library("beta", 50)).unwrap();
        registry.load(library("alpha", 50)).unwrap();
        assert_eq!(registry.names(), vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn test_remove() {
        let registry = ModuleRegistry::new();
        registry.load(library("rpc", 1)).unwrap();
        assert!(registry.remove("rpc").is_some());
        assert!(registry.remove("rpc").is_none());
        assert!(!registry.contains("rpc"));
    }
}
