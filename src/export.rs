//! Export Driver
//!
//! Publishes every library module's exports into the shared tables. One
//! named worker thread per module; results come back over a bounded channel
//! that doubles as the join barrier.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ExportDriver                        │
//! │                                                          │
//! │  module-export-1   module-export-2   ...  module-export-N│
//! │        │                 │                      │        │
//! │        └────────┬────────┴──────────────────────┘        │
//! │                 ▼                                        │
//! │      Bounded Channel (N) of (module, Result)             │
//! │                 │                                        │
//! │                 ▼                                        │
//! │   driver: receive N results, keep first failure,         │
//! │           then optional eager preload                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every module gets its chance to export even when another one fails; the
//! first failure in completion order is returned once all workers reported.
//! With a timeout configured the barrier gives up and names the modules still
//! pending.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{debug, error, info};

use crate::config::RuntimeConfig;
use crate::container::{EXPORTED_CLASSES_FILE, EXPORTED_RESOURCES_FILE};
use crate::error::ExportError;
use crate::modules::Module;
use crate::share::{SharedClassTable, SharedResourceIndex};

/// What one module published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub module: String,
    /// Exact names registered, `None` without an export list or manifest entries.
    pub classes: Option<usize>,
    pub packages: usize,
    /// Resource names registered, `None` without an export list.
    pub resources: Option<usize>,
}

/// Publishes module exports into the shared tables.
#[derive(Debug, Clone)]
pub struct ExportDriver {
    classes: Arc<SharedClassTable>,
    resources: Arc<SharedResourceIndex>,
    lazy: bool,
    timeout: Option<Duration>,
}

impl ExportDriver {
    pub fn new(classes: Arc<SharedClassTable>, resources: Arc<SharedResourceIndex>) -> Self {
        Self {
            classes,
            resources,
            lazy: true,
            timeout: None,
        }
    }

    /// Driver configured from `lazy_export` and `export_timeout_ms`.
    pub fn from_config(
        config: &RuntimeConfig,
        classes: Arc<SharedClassTable>,
        resources: Arc<SharedResourceIndex>,
    ) -> Self {
        Self::new(classes, resources)
            .with_lazy(config.lazy_export)
            .with_timeout(config.export_timeout())
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publish one module's exports on the calling thread.
    pub fn export_module(&self, module: &Module) -> Result<ExportSummary, ExportError> {
        let name = module.name();
        let namespace = module
            .namespace()
            .ok_or_else(|| ExportError::NoNamespace(name.to_string()))?;
        let archive = module
            .archive()
            .ok_or_else(|| ExportError::NoArchive(name.to_string()))?;

        let read_list = |path: &'static str| {
            archive.read_lines(path).map_err(|source| ExportError::ListFile {
                module: name.to_string(),
                path,
                source,
            })
        };

        let resources = read_list(EXPORTED_RESOURCES_FILE)?.map(|lines| {
            for resource in &lines {
                self.resources.add(resource, name, namespace);
            }
            lines.len()
        });

        let manifest_classes = module
            .descriptor()
            .map(|d| d.export.classes.clone())
            .unwrap_or_default();
        let listed_classes = read_list(EXPORTED_CLASSES_FILE)?;
        let classes = match (&listed_classes, manifest_classes.is_empty()) {
            (None, true) => None,
            _ => {
                let mut count = 0;
                for class in listed_classes.iter().flatten().chain(&manifest_classes) {
                    if self.classes.add_shared_class(class, name, namespace)? {
                        count += 1;
                    }
                }
                Some(count)
            }
        };

        let mut packages = 0;
        if let Some(descriptor) = module.descriptor() {
            for prefix in &descriptor.export.packages {
                self.classes.add_shared_package(prefix, name, namespace);
                packages += 1;
            }
        }

        debug!(module = name, ?classes, packages, ?resources, "module exports published");
        Ok(ExportSummary {
            module: name.to_string(),
            classes,
            packages,
            resources,
        })
    }

    /// Publish every module's exports concurrently and wait for all of them.
    pub fn export_all(&self, modules: &[Arc<Module>]) -> Result<Vec<ExportSummary>, ExportError> {
        if modules.is_empty() {
            return self.finish(Vec::new());
        }

        let started = Instant::now();
        let (tx, rx) = bounded(modules.len());
        let mut pending: BTreeSet<String> = BTreeSet::new();

        for (index, module) in modules.iter().enumerate() {
            let tx = tx.clone();
            let module = Arc::clone(module);
            let driver = self.clone();
            pending.insert(module.name().to_string());
            thread::Builder::new()
                .name(format!("module-export-{}", index + 1))
                .spawn(move || {
                    let name = module.name().to_string();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| driver.export_module(&module)))
                        .unwrap_or_else(|_| Err(ExportError::WorkerPanicked { module: name.clone() }));
                    if tx.send((name.clone(), result)).is_err() {
                        debug!(module = %name, "export finished after the barrier gave up");
                    }
                })
                .map_err(|source| ExportError::Spawn {
                    module: module_name(modules, index),
                    source,
                })?;
        }
        drop(tx);

        let deadline = self.timeout.map(|t| started + t);
        let mut summaries = Vec::with_capacity(modules.len());
        let mut first_error: Option<ExportError> = None;

        while !pending.is_empty() {
            let received = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(remaining) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => {
                            let pending: Vec<String> = pending.into_iter().collect();
                            error!(?pending, "module export timed out");
                            return Err(ExportError::Timeout {
                                waited_ms: started.elapsed().as_millis() as u64,
                                pending,
                            });
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            let (name, result) = received;
            pending.remove(&name);
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(module = %name, error = %e, "module export failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if let Some(module) = pending.into_iter().next() {
            return Err(ExportError::WorkerPanicked { module });
        }

        info!(
            modules = summaries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "module exports complete"
        );
        self.finish(summaries)
    }

    /// Resolve every exact export now unless the driver is lazy.
    fn preload(&self) -> Result<(), ExportError> {
        if !self.lazy {
            self.classes.preload_all().map_err(ExportError::Preload)?;
        }
        Ok(())
    }

    fn finish(&self, summaries: Vec<ExportSummary>) -> Result<Vec<ExportSummary>, ExportError> {
        self.preload()?;
        Ok(summaries)
    }
}

fn module_name(modules: &[Arc<Module>], index: usize) -> String {
    modules
        .get(index)
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}
