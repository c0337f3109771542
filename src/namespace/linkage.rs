//! Namespace linkage
//!
//! Everything a linked namespace may delegate to: the platform and framework
//! namespaces, the business namespace, the agents, and the shared tables.
//! One `Linkage` is created per runtime and shared by every linked namespace.
//!
//! The business and agent namespaces are held weakly; they own their linkage
//! through an `Arc`, and the runtime keeps them alive.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use super::Namespace;
use crate::config::{RuntimeConfig, HARNESS_PACKAGES};
use crate::modules::path::matches_any;
use crate::share::{SharedClassTable, SharedResourceIndex};

pub struct Linkage {
    platform: Arc<Namespace>,
    framework: Arc<Namespace>,
    framework_packages: Vec<String>,
    import_packages: Vec<String>,
    harness_packages: Vec<String>,
    business: OnceLock<Weak<Namespace>>,
    agents: RwLock<Vec<Weak<Namespace>>>,
    classes: Arc<SharedClassTable>,
    resources: Arc<SharedResourceIndex>,
}

impl Linkage {
    pub fn new(
        platform: Arc<Namespace>,
        framework: Arc<Namespace>,
        config: &RuntimeConfig,
        classes: Arc<SharedClassTable>,
        resources: Arc<SharedResourceIndex>,
    ) -> Self {
        Self {
            platform,
            framework,
            framework_packages: config.framework_packages.clone(),
            import_packages: config.import_packages(),
            harness_packages: HARNESS_PACKAGES.iter().map(|s| s.to_string()).collect(),
            business: OnceLock::new(),
            agents: RwLock::new(Vec::new()),
            classes,
            resources,
        }
    }

    /// Get the platform (bootstrap) namespace.
    pub fn platform(&self) -> &Arc<Namespace> {
        &self.platform
    }

    /// Get the container module's namespace.
    pub fn framework(&self) -> &Arc<Namespace> {
        &self.framework
    }

    /// Get the business namespace, once registered and still alive.
    pub fn business(&self) -> Option<Arc<Namespace>> {
        self.business.get().and_then(Weak::upgrade)
    }

    /// Register the business namespace. Only the first call takes effect.
    pub fn set_business(&self, namespace: &Arc<Namespace>) -> bool {
        self.business.set(Arc::downgrade(namespace)).is_ok()
    }

    pub fn add_agent(&self, namespace: &Arc<Namespace>) {
        self.agents.write().push(Arc::downgrade(namespace));
    }

    /// Live agent namespaces in registration order.
    pub fn agents(&self) -> Vec<Arc<Namespace>> {
        self.agents.read().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn shared_classes(&self) -> &Arc<SharedClassTable> {
        &self.classes
    }

    pub fn shared_resources(&self) -> &Arc<SharedResourceIndex> {
        &self.resources
    }

    /// Covered by the default import prefixes.
    pub fn imports_by_default(&self, name: &str) -> bool {
        matches_any(name, &self.import_packages)
    }

    /// Inside the framework-package allow-list.
    pub fn is_framework_symbol(&self, name: &str) -> bool {
        matches_any(name, &self.framework_packages)
    }

    /// Inside the unit-test harness prefixes.
    pub fn is_harness_symbol(&self, name: &str) -> bool {
        matches_any(name, &self.harness_packages)
    }
}

impl fmt::Debug for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linkage")
            .field("platform", &self.platform.name())
            .field("framework", &self.framework.name())
            .field("business", &self.business().map(|b| b.name().to_string()))
            .field("agents", &self.agents.read().len())
            .finish()
    }
}
