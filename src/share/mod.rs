//! Shared Export Tables
//!
//! The only cross-module mutable state in the runtime:
//! - [`SharedClassTable`] - exact exported names and exported package prefixes
//! - [`SharedResourceIndex`] - exported resource names and the namespaces that serve them
//!
//! Both are owned by the runtime and handed to every namespace through its
//! linkage. Entries hold weak namespace references, so a destroyed module's
//! namespace is dropped even if a stale entry survives a race.

mod classes;
mod resources;

pub use classes::SharedClassTable;
pub use resources::SharedResourceIndex;

use std::sync::{Arc, Weak};

use crate::namespace::Namespace;

/// A module that exports something, with a weak handle to its namespace.
#[derive(Debug, Clone)]
pub(crate) struct Exporter {
    module: String,
    namespace: Weak<Namespace>,
}

impl Exporter {
    pub(crate) fn new(module: &str, namespace: &Arc<Namespace>) -> Self {
        Self {
            module: module.to_string(),
            namespace: Arc::downgrade(namespace),
        }
    }

    pub(crate) fn module(&self) -> &str {
        &self.module
    }

    pub(crate) fn namespace(&self) -> Option<Arc<Namespace>> {
        self.namespace.upgrade()
    }
}
