//! Shared Resource Index
//!
//! Maps an exported resource name to the namespaces that declared it, in
//! registration order. A lookup asks each namespace's own classpath.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use super::Exporter;
use crate::namespace::Namespace;

#[derive(Default)]
pub struct SharedResourceIndex {
    resources: DashMap<String, Vec<Exporter>>,
}

impl SharedResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` as an exporter of resource `name`.
    pub fn add(&self, name: &str, module: &str, namespace: &Arc<Namespace>) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let mut exporters = self.resources.entry(name.to_string()).or_default();
        if !exporters.iter().any(|e| e.module() == module) {
            exporters.push(Exporter::new(module, namespace));
            trace!(resource = name, module, "shared resource registered");
        }
    }

    /// Live namespaces exporting `name`, in registration order.
    pub fn owners(&self, name: &str) -> Vec<Arc<Namespace>> {
        let exporters = match self.resources.get(name) {
            Some(e) => e.value().clone(),
            None => return Vec::new(),
        };
        exporters.iter().filter_map(Exporter::namespace).collect()
    }

    /// Names of modules exporting `name`.
    pub fn exporters(&self, name: &str) -> Vec<String> {
        self.resources
            .get(name)
            .map(|e| e.iter().map(|x| x.module().to_string()).collect())
            .unwrap_or_default()
    }

    /// Drop every registration of `module`. Returns the number removed.
    pub fn destroy_module(&self, module: &str) -> usize {
        let mut removed = 0;
        for mut exporters in self.resources.iter_mut() {
            let count = exporters.len();
            exporters.retain(|e| e.module() != module);
            removed += count - exporters.len();
        }
        self.resources.retain(|_, exporters| !exporters.is_empty());
        debug!(module, removed, "shared resource entries destroyed");
        removed
    }

    /// Get the number of exported resource names.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn clear(&self) {
        self.resources.clear();
    }
}

impl fmt::Debug for SharedResourceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedResourceIndex")
            .field("resources", &self.resources.len())
            .finish()
    }
}
