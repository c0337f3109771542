//! Runtime Lifecycle
//!
//! Owns the shared tables and the module registry and drives startup:
//!
//! 1. link - platform namespace, container module and its framework namespace
//! 2. agents - one namespace per agent container, registered in order
//! 3. business - the business namespace, root of import delegation
//! 4. merge - discover and de-duplicate library modules
//! 5. libraries - one namespace per library module
//! 6. export - publish exports in parallel, then optional eager preload
//! 7. provided - every declared provided symbol must resolve
//! 8. launch - resolve the entry point in the business namespace and hand it
//!    to the [`Launcher`]
//!
//! A failed start is terminal. Dynamic install and uninstall replay the
//! merge/export and destroy steps for one module at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::container::{Container, ContainerOpener, ContainerUrl};
use crate::error::RuntimeError;
use crate::export::ExportDriver;
use crate::modules::{DiscoveredModule, MergeEngine, Module, ModuleKind, ModuleRegistry};
use crate::namespace::{Linkage, Namespace, Symbol};
use crate::share::{SharedClassTable, SharedResourceIndex};

/// Name of the platform namespace.
pub const PLATFORM_NAME: &str = "platform";

/// Name of the container module.
pub const CONTAINER_NAME: &str = "container";

/// Error type returned by a [`Launcher`].
pub type LaunchError = Box<dyn std::error::Error + Send + Sync>;

/// Starts the business module once its entry point is resolved.
pub trait Launcher: Send + Sync {
    fn launch(
        &self,
        entry: Arc<Symbol>,
        args: &[String],
        namespace: &Arc<Namespace>,
    ) -> Result<(), LaunchError>;
}

/// Business entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub symbol: String,
    pub args: Vec<String>,
}

impl EntryPoint {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Everything the bootstrap collaborator hands to the runtime.
#[derive(Debug, Clone)]
pub struct BootContext {
    /// The application container; its `modules/*` are embedded modules.
    pub container: Arc<dyn Container>,
    /// Supplied library module URLs.
    pub module_urls: Vec<ContainerUrl>,
    pub business_classpath: Vec<ContainerUrl>,
    pub agent_urls: Vec<ContainerUrl>,
    pub platform_classpath: Vec<ContainerUrl>,
    pub entry: Option<EntryPoint>,
    /// Harness redirection on, entry point not launched.
    pub unit_test: bool,
}

impl BootContext {
    pub fn new(container: Arc<dyn Container>) -> Self {
        Self {
            container,
            module_urls: Vec::new(),
            business_classpath: Vec::new(),
            agent_urls: Vec::new(),
            platform_classpath: Vec::new(),
            entry: None,
            unit_test: false,
        }
    }

    pub fn with_module_urls(mut self, urls: Vec<ContainerUrl>) -> Self {
        self.module_urls = urls;
        self
    }

    pub fn with_business_classpath(mut self, urls: Vec<ContainerUrl>) -> Self {
        self.business_classpath = urls;
        self
    }

    pub fn with_agent_urls(mut self, urls: Vec<ContainerUrl>) -> Self {
        self.agent_urls = urls;
        self
    }

    pub fn with_platform_classpath(mut self, urls: Vec<ContainerUrl>) -> Self {
        self.platform_classpath = urls;
        self
    }

    pub fn with_entry(mut self, entry: EntryPoint) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn unit_test(mut self, unit_test: bool) -> Self {
        self.unit_test = unit_test;
        self
    }
}

/// Lifecycle state of a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Created,
    Starting,
    Started,
    /// Start failed; terminal.
    Failed,
    Stopped,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuntimeState::Created => "created",
            RuntimeState::Starting => "starting",
            RuntimeState::Started => "started",
            RuntimeState::Failed => "failed",
            RuntimeState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Modules that exist outside the registry.
struct Deployment {
    linkage: Arc<Linkage>,
    container: Arc<Module>,
    business: Arc<Namespace>,
    agents: Vec<Arc<Module>>,
}

impl Deployment {
    fn is_reserved(&self, name: &str) -> bool {
        name == self.container.name()
            || name == self.business.name()
            || self.agents.iter().any(|a| a.name() == name)
    }
}

/// The module-isolation runtime.
pub struct Runtime {
    config: RuntimeConfig,
    boot: BootContext,
    opener: Arc<dyn ContainerOpener>,
    launcher: Option<Arc<dyn Launcher>>,
    classes: Arc<SharedClassTable>,
    resources: Arc<SharedResourceIndex>,
    registry: ModuleRegistry,
    state: Mutex<RuntimeState>,
    deployment: RwLock<Option<Deployment>>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, boot: BootContext, opener: Arc<dyn ContainerOpener>) -> Self {
        Self {
            config,
            boot,
            opener,
            launcher: None,
            classes: Arc::new(SharedClassTable::new()),
            resources: Arc::new(SharedResourceIndex::new()),
            registry: ModuleRegistry::new(),
            state: Mutex::new(RuntimeState::Created),
            deployment: RwLock::new(None),
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Run the startup sequence. A second call is a no-op.
    pub fn start(&self) -> Result<(), RuntimeError> {
        {
            let mut state = self.state.lock();
            match *state {
                RuntimeState::Created => *state = RuntimeState::Starting,
                RuntimeState::Starting | RuntimeState::Started => {
                    debug!("runtime already {}", *state);
                    return Ok(());
                }
                RuntimeState::Failed => return Err(RuntimeError::Terminal),
                RuntimeState::Stopped => return Err(RuntimeError::Stopped),
            }
        }

        let started = Instant::now();
        let result = self.boot_sequence();
        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                *state = RuntimeState::Started;
                info!(
                    modules = self.registry.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "runtime started"
                );
                Ok(())
            }
            Err(e) => {
                *state = RuntimeState::Failed;
                error!(error = %e, "runtime failed to start");
                Err(e)
            }
        }
    }

    /// Drop every module and shared entry. The runtime cannot be restarted.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == RuntimeState::Stopped {
            return;
        }
        self.registry.clear();
        self.classes.clear();
        self.resources.clear();
        *self.deployment.write() = None;
        *state = RuntimeState::Stopped;
        info!("runtime stopped");
    }

    fn boot_sequence(&self) -> Result<(), RuntimeError> {
        let (linkage, container) = self.phase("link", || self.link())?;
        let agents = self.phase("agents", || self.load_agents(&linkage))?;
        let business = self.phase("business", || self.load_business(&linkage))?;
        *self.deployment.write() = Some(Deployment {
            linkage: Arc::clone(&linkage),
            container,
            business: Arc::clone(&business),
            agents,
        });

        let discovered = self.phase("merge", || {
            let engine = self.merge_engine();
            Ok(engine.merge(
                self.config.module_dir.as_deref(),
                self.boot.container.as_ref(),
                &self.boot.module_urls,
            )?)
        })?;
        self.phase("libraries", || {
            discovered
                .into_iter()
                .try_for_each(|d| self.load_library(&linkage, d).map(|_| ()))
        })?;
        self.phase("export", || {
            let driver = ExportDriver::from_config(
                &self.config,
                Arc::clone(&self.classes),
                Arc::clone(&self.resources),
            );
            Ok(driver.export_all(&self.registry.all())?)
        })?;
        self.phase("provided", || self.check_provided(&self.registry.all()))?;
        self.phase("launch", || self.launch(&business))
    }

    fn phase<T>(
        &self,
        name: &'static str,
        run: impl FnOnce() -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        debug!(phase = name, "phase starting");
        let started = Instant::now();
        let result = run();
        info!(
            phase = name,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "phase finished"
        );
        result
    }

    fn link(&self) -> Result<(Arc<Linkage>, Arc<Module>), RuntimeError> {
        let platform_module = Module::platform(PLATFORM_NAME, self.open_all(&self.boot.platform_classpath)?);
        let platform = Arc::new(Namespace::standalone(
            PLATFORM_NAME,
            ModuleKind::Platform,
            platform_module.classpath().to_vec(),
        ));

        let container = Arc::new(Module::container(CONTAINER_NAME, Arc::clone(&self.boot.container))?);
        let framework = Arc::new(Namespace::standalone(
            container.name(),
            ModuleKind::Container,
            container.classpath().to_vec(),
        ));
        container.attach_namespace(Arc::clone(&framework));

        let linkage = Arc::new(Linkage::new(
            platform,
            framework,
            &self.config,
            Arc::clone(&self.classes),
            Arc::clone(&self.resources),
        ));
        Ok((linkage, container))
    }

    fn load_agents(&self, linkage: &Arc<Linkage>) -> Result<Vec<Arc<Module>>, RuntimeError> {
        let mut agents = Vec::with_capacity(self.boot.agent_urls.len());
        for url in &self.boot.agent_urls {
            let module = Arc::new(Module::agent(self.opener.open(url)?));
            let namespace = Arc::new(Namespace::agent(&module, Arc::clone(linkage)));
            linkage.add_agent(&namespace);
            module.attach_namespace(namespace);
            info!(module = %module.name(), "agent module loaded");
            agents.push(module);
        }
        Ok(agents)
    }

    fn load_business(&self, linkage: &Arc<Linkage>) -> Result<Arc<Namespace>, RuntimeError> {
        let module = Module::business(
            &self.config.business_name,
            self.open_all(&self.boot.business_classpath)?,
        );
        let namespace = Arc::new(Namespace::business(
            &module,
            Arc::clone(linkage),
            self.boot.unit_test,
        ));
        linkage.set_business(&namespace);
        info!(
            module = %module.name(),
            classpath = module.classpath().len(),
            unit_test = self.boot.unit_test,
            "business namespace created"
        );
        Ok(namespace)
    }

    fn load_library(
        &self,
        linkage: &Arc<Linkage>,
        discovered: DiscoveredModule,
    ) -> Result<Arc<Module>, RuntimeError> {
        let mut descriptor = discovered.descriptor;
        descriptor.import.load_from_system = self.config.load_from_system;
        if self.is_reserved(&descriptor.name) {
            return Err(RuntimeError::DuplicateModule(descriptor.name));
        }
        let module = Arc::new(Module::library(descriptor, discovered.container)?);
        module.attach_namespace(Arc::new(Namespace::library(&module, Arc::clone(linkage))));
        info!(
            module = %module.name(),
            priority = module.priority(),
            source = %discovered.source,
            "library module loaded"
        );
        self.registry.load(module)
    }

    fn check_provided(&self, modules: &[Arc<Module>]) -> Result<(), RuntimeError> {
        for module in modules {
            if let Some(namespace) = module.namespace() {
                let count = namespace.check_provided()?;
                if count > 0 {
                    debug!(module = %module.name(), count, "provided symbols verified");
                }
            }
        }
        Ok(())
    }

    fn launch(&self, business: &Arc<Namespace>) -> Result<(), RuntimeError> {
        if self.boot.unit_test {
            info!("unit-test mode, business entry point not launched");
            return Ok(());
        }
        let entry = self
            .boot
            .entry
            .as_ref()
            .ok_or_else(|| RuntimeError::MissingEntryPoint(business.name().to_string()))?;
        let symbol = business.resolve(&entry.symbol)?;
        match &self.launcher {
            Some(launcher) => {
                launcher
                    .launch(symbol, &entry.args, business)
                    .map_err(|e| RuntimeError::Launch {
                        entry: entry.symbol.clone(),
                        reason: e.to_string(),
                    })?;
                info!(entry = %entry.symbol, "business module launched");
            }
            None => debug!(entry = %entry.symbol, "entry point resolved, no launcher configured"),
        }
        Ok(())
    }

    fn open_all(&self, urls: &[ContainerUrl]) -> Result<Vec<Arc<dyn Container>>, RuntimeError> {
        urls.iter()
            .map(|url| self.opener.open(url).map_err(RuntimeError::from))
            .collect()
    }

    fn merge_engine(&self) -> MergeEngine {
        MergeEngine::new(Arc::clone(&self.opener), self.config.duplicate_nested)
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.deployment
            .read()
            .as_ref()
            .map(|d| d.is_reserved(name))
            .unwrap_or(false)
    }

    fn started_linkage(&self) -> Result<Arc<Linkage>, RuntimeError> {
        match *self.state.lock() {
            RuntimeState::Started => {}
            RuntimeState::Stopped => return Err(RuntimeError::Stopped),
            RuntimeState::Failed => return Err(RuntimeError::Terminal),
            RuntimeState::Created | RuntimeState::Starting => return Err(RuntimeError::NotStarted),
        }
        self.deployment
            .read()
            .as_ref()
            .map(|d| Arc::clone(&d.linkage))
            .ok_or(RuntimeError::NotStarted)
    }

    // ========================================================================
    // Dynamic install / uninstall
    // ========================================================================

    /// Install the module at `url` (and any modules nested in it), then
    /// publish their exports. Returns the installed module names.
    pub fn install_module(&self, url: &ContainerUrl) -> Result<Vec<String>, RuntimeError> {
        let linkage = self.started_linkage()?;
        let engine = self.merge_engine();
        let candidates = engine.parse_urls(std::slice::from_ref(url))?;
        let discovered = engine.describe(engine.expand_nested(candidates)?)?;

        if let Some(taken) = discovered
            .iter()
            .map(|d| d.descriptor.name.as_str())
            .find(|name| self.registry.contains(name) || self.is_reserved(name))
        {
            return Err(RuntimeError::DuplicateModule(taken.to_string()));
        }

        let mut installed = Vec::with_capacity(discovered.len());
        for d in discovered {
            match self.load_library(&linkage, d) {
                Ok(module) => installed.push(module),
                Err(e) => {
                    self.rollback(&installed);
                    return Err(e);
                }
            }
        }

        let driver = ExportDriver::from_config(
            &self.config,
            Arc::clone(&self.classes),
            Arc::clone(&self.resources),
        );
        if let Err(e) = driver.export_all(&installed) {
            error!(url = %url, error = %e, "export of installed modules failed");
            self.rollback(&installed);
            return Err(e.into());
        }

        if let Err(e) = self.check_provided(&installed) {
            self.rollback(&installed);
            return Err(e);
        }

        let names: Vec<String> = installed.iter().map(|m| m.name().to_string()).collect();
        info!(url = %url, modules = ?names, "modules installed");
        Ok(names)
    }

    fn rollback(&self, installed: &[Arc<Module>]) {
        for module in installed {
            self.classes.destroy_module(module.name());
            self.resources.destroy_module(module.name());
            self.registry.remove(module.name());
        }
    }

    /// Destroy a library module. `Ok(false)` when no such module exists.
    pub fn uninstall_module(&self, name: &str) -> Result<bool, RuntimeError> {
        self.started_linkage()?;
        if self.is_reserved(name) {
            return Err(RuntimeError::NotDestroyable(name.to_string()));
        }
        if let Some(module) = self.registry.get(name) {
            if !module.is_destroyable() {
                return Err(RuntimeError::NotDestroyable(name.to_string()));
            }
        }

        let classes = self.classes.destroy_module(name);
        let resources = self.resources.destroy_module(name);
        match self.registry.remove(name) {
            Some(_) => {
                info!(module = name, classes, resources, "module uninstalled");
                Ok(true)
            }
            None => {
                info!(module = name, "module does not exist, nothing to uninstall");
                Ok(false)
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> RuntimeState {
        *self.state.lock()
    }

    pub fn is_started(&self) -> bool {
        self.state() == RuntimeState::Started
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Whether a library module named `name` is loaded.
    pub fn module_loaded(&self, name: &str) -> bool {
        !name.trim().is_empty() && self.registry.contains(name)
    }

    /// Library module names ordered by priority, then name.
    pub fn loaded_modules(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Namespace of any module: libraries, business, agents or the container.
    pub fn namespace(&self, name: &str) -> Option<Arc<Namespace>> {
        if let Some(module) = self.registry.get(name) {
            return module.namespace().cloned();
        }
        let deployment = self.deployment.read();
        let deployment = deployment.as_ref()?;
        if deployment.business.name() == name {
            return Some(Arc::clone(&deployment.business));
        }
        deployment
            .agents
            .iter()
            .chain(std::iter::once(&deployment.container))
            .find(|m| m.name() == name)
            .and_then(|m| m.namespace().cloned())
    }

    pub fn business_namespace(&self) -> Option<Arc<Namespace>> {
        self.deployment
            .read()
            .as_ref()
            .map(|d| Arc::clone(&d.business))
    }

    /// Agent namespaces in registration order.
    pub fn agent_namespaces(&self) -> Vec<Arc<Namespace>> {
        self.deployment
            .read()
            .as_ref()
            .map(|d| d.agents.iter().filter_map(|a| a.namespace().cloned()).collect())
            .unwrap_or_default()
    }

    /// Every exported symbol that resolves, keyed by name.
    pub fn exported_symbols(&self) -> BTreeMap<String, Arc<Symbol>> {
        let symbols = self.classes.exported_symbols();
        if symbols.is_empty() {
            warn!("no symbols exported by any module");
        }
        symbols
    }

    pub fn shared_classes(&self) -> &Arc<SharedClassTable> {
        &self.classes
    }

    pub fn shared_resources(&self) -> &Arc<SharedResourceIndex> {
        &self.resources
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("state", &self.state())
            .field("modules", &self.registry.names())
            .field("classes", &self.classes)
            .finish()
    }
}
