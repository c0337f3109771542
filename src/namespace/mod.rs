//! Symbol Namespaces
//!
//! One namespace per module. A namespace resolves symbol names to
//! [`Symbol`]s and resource names to [`ResourceLocation`]s by walking the
//! ordered steps of its [`ResolvePolicy`]. The first step that produces a
//! result wins; "not found" is reported only after the last step.
//!
//! # Records
//! Two caches, both filled with atomic compute-if-absent semantics:
//! - `records` - every symbol this namespace has resolved, whatever its source
//! - `defined` - symbols defined from this namespace's own classpath
//!
//! Other namespaces only ever see `defined` (through
//! [`Namespace::find_in_classpath`]); a namespace never re-exports what it
//! borrowed from someone else.
//!
//! # Linkage
//! Platform and container namespaces are standalone. Business, library and
//! agent namespaces hold a shared [`Linkage`] to reach everything else.

mod linkage;
mod policy;
mod symbol;

pub use linkage::Linkage;
pub use policy::{ClassStep, ResolvePolicy, ResourceStep};
pub use symbol::{hash_bytes, Symbol};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use itertools::Itertools;
use tracing::{debug, error, trace, warn};

use crate::container::{Container, ResourceLocation};
use crate::error::ResolveError;
use crate::modules::path::class_entry_path;
use crate::modules::{ImportInfo, Module, ModuleKind};

/// Per-module symbol resolver.
pub struct Namespace {
    name: String,
    kind: ModuleKind,
    policy: ResolvePolicy,
    classpath: Vec<Arc<dyn Container>>,
    imports: ImportInfo,
    provided: HashSet<String>,
    /// Consult the owner for imports and as a fallback.
    delegates_to_owner: bool,
    records: DashMap<String, Arc<Symbol>>,
    defined: DashMap<String, Arc<Symbol>>,
    link: Option<Arc<Linkage>>,
}

impl Namespace {
    /// A namespace that only sees its own classpath.
    pub fn standalone(name: &str, kind: ModuleKind, classpath: Vec<Arc<dyn Container>>) -> Self {
        Self::build(
            name,
            kind,
            ResolvePolicy::STANDALONE,
            classpath,
            ImportInfo::default(),
            HashSet::new(),
            false,
            None,
        )
    }

    /// The business namespace. `unit_test` enables harness redirection.
    pub fn business(module: &Module, link: Arc<Linkage>, unit_test: bool) -> Self {
        Self::build(
            module.name(),
            ModuleKind::Business,
            ResolvePolicy::for_kind(ModuleKind::Business, unit_test),
            module.classpath().to_vec(),
            ImportInfo::default(),
            HashSet::new(),
            false,
            Some(link),
        )
    }

    /// A library namespace configured from the module's descriptor.
    pub fn library(module: &Module, link: Arc<Linkage>) -> Self {
        let (imports, provided) = match module.descriptor() {
            Some(d) => (d.import.clone(), d.provided.iter().cloned().collect()),
            None => (ImportInfo::default(), HashSet::new()),
        };
        let delegates = imports.load_from_owner;
        Self::build(
            module.name(),
            ModuleKind::Library,
            ResolvePolicy::LIBRARY,
            module.classpath().to_vec(),
            imports,
            provided,
            delegates,
            Some(link),
        )
    }

    /// An agent namespace. Agents always consult the owner.
    pub fn agent(module: &Module, link: Arc<Linkage>) -> Self {
        Self::build(
            module.name(),
            ModuleKind::Agent,
            ResolvePolicy::AGENT,
            module.classpath().to_vec(),
            ImportInfo::default(),
            HashSet::new(),
            true,
            Some(link),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        name: &str,
        kind: ModuleKind,
        policy: ResolvePolicy,
        classpath: Vec<Arc<dyn Container>>,
        imports: ImportInfo,
        provided: HashSet<String>,
        delegates_to_owner: bool,
        link: Option<Arc<Linkage>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            policy,
            classpath,
            imports,
            provided,
            delegates_to_owner,
            records: DashMap::new(),
            defined: DashMap::new(),
            link,
        }
    }

    /// Get the owning module's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn policy(&self) -> &ResolvePolicy {
        &self.policy
    }

    pub fn classpath(&self) -> &[Arc<dyn Container>] {
        &self.classpath
    }

    pub fn linkage(&self) -> Option<&Arc<Linkage>> {
        self.link.as_ref()
    }

    /// Whether `name` has already been resolved here.
    pub fn is_resolved(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Number of symbols defined from the local classpath.
    pub fn defined_count(&self) -> usize {
        self.defined.len()
    }

    // ========================================================================
    // Symbols
    // ========================================================================

    /// Resolve `name` through this namespace's policy.
    pub fn resolve(&self, name: &str) -> Result<Arc<Symbol>, ResolveError> {
        if name.trim().is_empty() {
            return Err(ResolveError::BlankName);
        }
        for step in self.policy.classes {
            if let Some(symbol) = self.class_step(*step, name)? {
                trace!(module = %self.name, symbol = name, ?step, from = symbol.module(), "resolved");
                return Ok(self.record(name, symbol));
            }
        }
        debug!(module = %self.name, symbol = name, "symbol not found");
        Err(ResolveError::NotFound {
            name: name.to_string(),
            module: self.name.clone(),
        })
    }

    /// Local definitions only. This is what other namespaces see.
    pub fn find_in_classpath(&self, name: &str) -> Result<Option<Arc<Symbol>>, ResolveError> {
        if let Some(symbol) = self.defined.get(name).map(|s| Arc::clone(s.value())) {
            return Ok(Some(symbol));
        }
        self.define_local(name)
    }

    fn record(&self, name: &str, symbol: Arc<Symbol>) -> Arc<Symbol> {
        Arc::clone(self.records.entry(name.to_string()).or_insert(symbol).value())
    }

    fn define_local(&self, name: &str) -> Result<Option<Arc<Symbol>>, ResolveError> {
        let path = class_entry_path(name);
        for container in &self.classpath {
            let bytes = container
                .read(&path)
                .map_err(|source| ResolveError::Container {
                    name: name.to_string(),
                    module: self.name.clone(),
                    source,
                })?;
            if let Some(bytes) = bytes {
                let location = ResourceLocation::new(container.url().clone(), path.as_str());
                let symbol = Arc::new(Symbol::new(name, &self.name, location, bytes));
                let defined = self.defined.entry(name.to_string()).or_insert(symbol);
                return Ok(Some(Arc::clone(defined.value())));
            }
        }
        Ok(None)
    }

    fn owner(&self) -> Option<Arc<Namespace>> {
        self.link.as_ref().and_then(|l| l.business())
    }

    fn imports_from_owner(&self, link: &Linkage, name: &str) -> bool {
        link.imports_by_default(name) || self.imports.imports_class(name)
    }

    fn class_step(&self, step: ClassStep, name: &str) -> Result<Option<Arc<Symbol>>, ResolveError> {
        match step {
            ClassStep::Records => Ok(self.records.get(name).map(|s| Arc::clone(s.value()))),
            ClassStep::Local => self.find_in_classpath(name),
            _ => match &self.link {
                Some(link) => self.linked_step(link, step, name),
                None => Ok(None),
            },
        }
    }

    fn linked_step(
        &self,
        link: &Linkage,
        step: ClassStep,
        name: &str,
    ) -> Result<Option<Arc<Symbol>>, ResolveError> {
        match step {
            ClassStep::Harness => {
                if !link.is_harness_symbol(name) {
                    return Ok(None);
                }
                match link.platform().find_in_classpath(name) {
                    Ok(Some(symbol)) => Ok(Some(symbol)),
                    _ => Err(ResolveError::Harness {
                        name: name.to_string(),
                    }),
                }
            }
            ClassStep::Platform => link.platform().find_in_classpath(name),
            ClassStep::Framework => {
                if link.is_framework_symbol(name) {
                    link.framework().find_in_classpath(name)
                } else {
                    Ok(None)
                }
            }
            ClassStep::Shared => link.shared_classes().get(name),
            ClassStep::Provided => {
                if !self.provided.contains(name) {
                    return Ok(None);
                }
                let outcome = match self.owner() {
                    Some(owner) => owner.find_in_classpath(name).map_err(|e| e.to_string()),
                    None => Err("business namespace is not available".to_string()),
                };
                match outcome {
                    Ok(Some(symbol)) => Ok(Some(symbol)),
                    Ok(None) => Err(self.provided_failure(name, "not on the business classpath".to_string())),
                    Err(reason) => Err(self.provided_failure(name, reason)),
                }
            }
            ClassStep::Imported => {
                if !self.delegates_to_owner || !self.imports_from_owner(link, name) {
                    return Ok(None);
                }
                let Some(owner) = self.owner() else {
                    return Ok(None);
                };
                match owner.find_in_classpath(name) {
                    Ok(found) => {
                        if found.is_none() {
                            debug!(module = %self.name, symbol = name, "imported symbol not in business namespace");
                        }
                        Ok(found)
                    }
                    Err(e) => {
                        warn!(module = %self.name, symbol = name, error = %e, "import from business namespace failed");
                        Ok(None)
                    }
                }
            }
            ClassStep::Owner => {
                if !self.delegates_to_owner {
                    return Ok(None);
                }
                match self.owner() {
                    Some(owner) => owner.find_in_classpath(name),
                    None => Ok(None),
                }
            }
            ClassStep::Agents => {
                for agent in link.agents() {
                    if let Some(symbol) = agent.find_in_classpath(name)? {
                        return Ok(Some(symbol));
                    }
                }
                Ok(None)
            }
            ClassStep::Records | ClassStep::Local => self.class_step(step, name),
        }
    }

    /// Resolve every symbol listed in `conf/provided.classes`.
    pub fn check_provided(&self) -> Result<usize, ResolveError> {
        let mut names: Vec<&String> = self.provided.iter().collect();
        names.sort();
        for name in &names {
            self.resolve(name)?;
        }
        Ok(names.len())
    }

    fn provided_failure(&self, name: &str, reason: String) -> ResolveError {
        error!(module = %self.name, symbol = name, reason = %reason, "provided symbol unavailable");
        ResolveError::Provided {
            name: name.to_string(),
            module: self.name.clone(),
            reason,
        }
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// First location of resource `name` according to the policy.
    pub fn resource(&self, name: &str) -> Result<Option<ResourceLocation>, ResolveError> {
        if name.trim().is_empty() {
            return Err(ResolveError::BlankName);
        }
        for step in self.policy.resource {
            if let Some(found) = self.resource_step(*step, name, true)?.into_iter().next() {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Every location of resource `name`, de-duplicated in discovery order.
    pub fn resources(&self, name: &str) -> Result<Vec<ResourceLocation>, ResolveError> {
        if name.trim().is_empty() {
            return Err(ResolveError::BlankName);
        }
        let mut all = Vec::new();
        for step in self.policy.resources {
            all.extend(self.resource_step(*step, name, false)?);
        }
        Ok(all.into_iter().unique().collect())
    }

    fn local_lookup(&self, name: &str, first_only: bool) -> Result<Vec<ResourceLocation>, ResolveError> {
        let mut found = Vec::new();
        for container in &self.classpath {
            let location = container
                .resource(name)
                .map_err(|source| ResolveError::Container {
                    name: name.to_string(),
                    module: self.name.clone(),
                    source,
                })?;
            if let Some(location) = location {
                found.push(location);
                if first_only {
                    break;
                }
            }
        }
        Ok(found)
    }

    fn resource_step(
        &self,
        step: ResourceStep,
        name: &str,
        first_only: bool,
    ) -> Result<Vec<ResourceLocation>, ResolveError> {
        if step == ResourceStep::Local {
            return self.local_lookup(name, first_only);
        }
        let Some(link) = &self.link else {
            return Ok(Vec::new());
        };
        match step {
            ResourceStep::Platform => link.platform().local_lookup(name, first_only),
            ResourceStep::Imported => {
                if !self.delegates_to_owner || !self.imports.imports_resource(name) {
                    return Ok(Vec::new());
                }
                match self.owner() {
                    Some(owner) => owner.local_lookup(name, first_only),
                    None => Ok(Vec::new()),
                }
            }
            ResourceStep::Exported => {
                let mut found = Vec::new();
                for exporter in link.shared_resources().owners(name) {
                    found.extend(exporter.local_lookup(name, first_only)?);
                    if first_only && !found.is_empty() {
                        break;
                    }
                }
                Ok(found)
            }
            ResourceStep::Owner => {
                if !self.delegates_to_owner {
                    return Ok(Vec::new());
                }
                match self.owner() {
                    Some(owner) => owner.local_lookup(name, first_only),
                    None => Ok(Vec::new()),
                }
            }
            ResourceStep::Agents => {
                let mut found = Vec::new();
                for agent in link.agents() {
                    found.extend(agent.local_lookup(name, first_only)?);
                    if first_only && !found.is_empty() {
                        break;
                    }
                }
                Ok(found)
            }
            ResourceStep::Local => self.local_lookup(name, first_only),
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("classpath", &self.classpath.iter().map(|c| c.url().as_str()).collect::<Vec<_>>())
            .field("resolved", &self.records.len())
            .field("defined", &self.defined.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::container::{MemContainer, MemContainerBuilder};
    use crate::modules::{ModuleDescriptor, IMPORT_CLASSES, IMPORT_RESOURCES, LOAD_FROM_OWNER};
    use crate::share::{SharedClassTable, SharedResourceIndex};

    struct Fixture {
        link: Arc<Linkage>,
        business: Arc<Namespace>,
    }

    fn standalone(name: &str, kind: ModuleKind, builder: MemContainerBuilder) -> Arc<Namespace> {
        let container: Arc<dyn Container> = builder.build(format!("mem:{}", name));
        Arc::new(Namespace::standalone(name, kind, vec![container]))
    }

    fn fixture(platform: MemContainerBuilder, business: MemContainerBuilder) -> Fixture {
        let link = Arc::new(Linkage::new(
            standalone("platform", ModuleKind::Platform, platform),
            standalone(
                "container",
                ModuleKind::Container,
                MemContainer::builder().symbol("islet.api.Service", "fw").symbol("islet.internal.Impl", "fw"),
            ),
            &RuntimeConfig::default(),
            Arc::new(SharedClassTable::new()),
            Arc::new(SharedResourceIndex::new()),
        ));
        let business: Arc<dyn Container> = business.build("mem:business");
        let module = Module::business("business", vec![business]);
        let business = Arc::new(Namespace::business(&module, Arc::clone(&link), false));
        link.set_business(&business);
        Fixture { link, business }
    }

    fn library(fixture: &Fixture, builder: MemContainerBuilder) -> Arc<Namespace> {
        let archive: Arc<dyn Container> = builder.build("mem:lib");
        let descriptor = ModuleDescriptor::read(archive.as_ref()).unwrap();
        let module = Module::library(descriptor, archive).unwrap();
        Arc::new(Namespace::library(&module, Arc::clone(&fixture.link)))
    }

    // ========================================================================
    // Library resolution order
    // ========================================================================

    #[test]
    fn test_default_import_goes_to_business() {
        let fx = fixture(
            MemContainer::builder(),
            MemContainer::builder().symbol("org.slf4j.Logger", "biz"),
        );
        let lib = library(
            &fx,
            MemContainer::builder()
                .module_name("lib")
                .attribute(LOAD_FROM_OWNER, "true")
                .symbol("org.slf4j.Logger", "lib"),
        );

        let logger = lib.resolve("org.slf4j.Logger").unwrap();
        assert_eq!(logger.module(), "business");
        assert!(Symbol::same(&logger, &fx.business.resolve("org.slf4j.Logger").unwrap()));
        assert_eq!(lib.defined_count(), 0);
    }

    #[test]
    fn test_imports_ignored_without_load_from_owner() {
        let fx = fixture(
            MemContainer::builder(),
            MemContainer::builder().symbol("org.slf4j.Logger", "biz"),
        );
        let lib = library(
            &fx,
            MemContainer::builder().module_name("lib").symbol("org.slf4j.Logger", "lib"),
        );
        assert_eq!(lib.resolve("org.slf4j.Logger").unwrap().module(), "lib");
    }

    #[test]
    fn test_declared_import_class() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder().symbol("com.biz.Config", "biz"));
        let lib = library(
            &fx,
            MemContainer::builder()
                .module_name("lib")
                .attribute(LOAD_FROM_OWNER, "true")
                .attribute(IMPORT_CLASSES, "com.biz.Config")
                .symbol("com.biz.Config", "lib"),
        );
        assert_eq!(lib.resolve("com.biz.Config").unwrap().module(), "business");
    }

    #[test]
    fn test_owner_fallback_after_local() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder().symbol("com.biz.Only", "biz"));
        let delegating = library(
            &fx,
            MemContainer::builder().module_name("lib").attribute(LOAD_FROM_OWNER, "true"),
        );
        assert_eq!(delegating.resolve("com.biz.Only").unwrap().module(), "business");

        let isolated = library(&fx, MemContainer::builder().module_name("iso"));
        let err = isolated.resolve("com.biz.Only").unwrap_err();
        assert_eq!(err.to_string(), "symbol com.biz.Only not found in module iso");
    }

    #[test]
    fn test_platform_wins_over_local() {
        let fx = fixture(MemContainer::builder().symbol("std.String", "platform"), MemContainer::builder());
        let lib = library(&fx, MemContainer::builder().module_name("lib").symbol("std.String", "lib"));
        assert_eq!(lib.resolve("std.String").unwrap().module(), "platform");
    }

    #[test]
    fn test_framework_allow_list() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder());
        let lib = library(&fx, MemContainer::builder().module_name("lib"));
        assert_eq!(lib.resolve("islet.api.Service").unwrap().module(), "container");
        assert!(lib.resolve("islet.internal.Impl").is_err());
    }

    #[test]
    fn test_provided_failure_names_module_and_symbol() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder());
        let lib = library(
            &fx,
            MemContainer::builder()
                .module_name("rpc")
                .lines(crate::container::PROVIDED_CLASSES_FILE, &["com.biz.Foo"])
                .symbol("com.biz.Foo", "local copy"),
        );
        let err = lib.resolve("com.biz.Foo").unwrap_err();
        assert!(matches!(err, ResolveError::Provided { .. }));
        let msg = err.to_string();
        assert!(msg.contains("com.biz.Foo") && msg.contains("rpc"));
    }

    #[test]
    fn test_provided_resolves_from_business() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder().symbol("com.biz.Foo", "biz"));
        let lib = library(
            &fx,
            MemContainer::builder()
                .module_name("rpc")
                .lines(crate::container::PROVIDED_CLASSES_FILE, &["com.biz.Foo"]),
        );
        assert_eq!(lib.resolve("com.biz.Foo").unwrap().module(), "business");
    }

    #[test]
    fn test_check_provided() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder().symbol("com.biz.Foo", "biz"));
        let lib = library(
            &fx,
            MemContainer::builder()
                .module_name("rpc")
                .lines(crate::container::PROVIDED_CLASSES_FILE, &["com.biz.Foo", "com.biz.Bar"]),
        );
        match lib.check_provided() {
            Err(ResolveError::Provided { name, module, .. }) => {
                assert_eq!(name, "com.biz.Bar");
                assert_eq!(module, "rpc");
            }
            other => panic!("expected provided failure, got {:?}", other),
        }
    }

    #[test]
    fn test_resolution_is_cached() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder());
        let lib = library(&fx, MemContainer::builder().module_name("lib").symbol("a.B", "x"));
        let first = lib.resolve("a.B").unwrap();
        assert!(lib.is_resolved("a.B"));
        assert!(Symbol::same(&first, &lib.resolve("a.B").unwrap()));
    }

    #[test]
    fn test_blank_name() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder());
        assert!(matches!(fx.business.resolve("  "), Err(ResolveError::BlankName)));
        assert!(matches!(fx.business.resources(""), Err(ResolveError::BlankName)));
    }

    // ========================================================================
    // Business and unit-test harness
    // ========================================================================

    #[test]
    fn test_business_never_sees_library_locals() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder());
        let _lib = library(&fx, MemContainer::builder().module_name("lib").symbol("lib.Hidden", "x"));
        assert!(matches!(
            fx.business.resolve("lib.Hidden"),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_harness_redirects_to_platform() {
        let fx = fixture(
            MemContainer::builder().symbol("org.junit.Test", "platform"),
            MemContainer::builder(),
        );
        let classpath: Arc<dyn Container> = MemContainer::builder()
            .symbol("org.junit.Test", "biz")
            .build("mem:biz-test");
        let module = Module::business("business", vec![classpath]);
        let harness = Namespace::business(&module, Arc::clone(&fx.link), true);
        assert_eq!(harness.resolve("org.junit.Test").unwrap().module(), "platform");
        assert!(matches!(
            harness.resolve("org.hamcrest.Matcher"),
            Err(ResolveError::Harness { .. })
        ));
    }

    // ========================================================================
    // Resources
    // ========================================================================

    #[test]
    fn test_imported_resource_and_aggregate() {
        let fx = fixture(
            MemContainer::builder().file("app.properties", "platform"),
            MemContainer::builder().file("app.properties", "biz"),
        );
        let lib = library(
            &fx,
            MemContainer::builder()
                .module_name("lib")
                .attribute(LOAD_FROM_OWNER, "true")
                .attribute(IMPORT_RESOURCES, "app.properties")
                .file("app.properties", "lib"),
        );
        let first = lib.resource("app.properties").unwrap().unwrap();
        assert_eq!(first.container().as_str(), "mem:platform");

        let all = lib.resources("app.properties").unwrap();
        let containers: Vec<&str> = all.iter().map(|l| l.container().as_str()).collect();
        assert_eq!(containers, vec!["mem:platform", "mem:business", "mem:lib"]);
    }

    #[test]
    fn test_aggregate_deduplicates() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder());
        let lib = library(&fx, MemContainer::builder().module_name("lib").file("conf/x.xml", "lib"));
        fx.link.shared_resources().add("conf/x.xml", "lib", &lib);
        let all = lib.resources("conf/x.xml").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(fx.business.resources("conf/x.xml").unwrap(), all);
    }

    #[test]
    fn test_missing_resource() {
        let fx = fixture(MemContainer::builder(), MemContainer::builder());
        assert!(fx.business.resource("nothing.txt").unwrap().is_none());
        assert!(fx.business.resources("nothing.txt").unwrap().is_empty());
    }
}
