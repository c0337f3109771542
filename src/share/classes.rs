//! Shared Class Table
//!
//! Two indices:
//! - exact name -> owning module, plus the symbol once resolved
//! - package prefix -> every module exporting that prefix
//!
//! Exact names are claimed atomically per name through the map's entry API;
//! the first owner stays. Package prefixes may overlap: a lookup tries every
//! exporter of the most specific matching prefix and fails only if more than
//! one actually produces the symbol.
//!
//! No map guard is held while calling into a namespace.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use super::Exporter;
use crate::error::{ExportError, ResolveError};
use crate::modules::path::package_prefixes;
use crate::namespace::{Namespace, Symbol};

struct SharedEntry {
    owner: Exporter,
    symbol: OnceLock<Arc<Symbol>>,
}

impl SharedEntry {
    fn unresolved(owner: Exporter) -> Arc<Self> {
        Arc::new(Self {
            owner,
            symbol: OnceLock::new(),
        })
    }
}

/// Global directory of exported symbols.
#[derive(Default)]
pub struct SharedClassTable {
    classes: DashMap<String, Arc<SharedEntry>>,
    packages: DashMap<String, Vec<Exporter>>,
}

impl SharedClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim exact name `name` for `module`.
    ///
    /// Returns `Ok(false)` when `module` already owns the name. A different
    /// owner is a conflict and leaves the first owner in place.
    pub fn add_shared_class(
        &self,
        name: &str,
        module: &str,
        namespace: &Arc<Namespace>,
    ) -> Result<bool, ExportError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        match self.classes.entry(name.to_string()) {
            MapEntry::Occupied(existing) => {
                let owner = existing.get().owner.module();
                if owner == module {
                    Ok(false)
                } else {
                    Err(ExportError::Conflict {
                        name: name.to_string(),
                        existing: owner.to_string(),
                        incoming: module.to_string(),
                    })
                }
            }
            MapEntry::Vacant(slot) => {
                slot.insert(SharedEntry::unresolved(Exporter::new(module, namespace)));
                trace!(symbol = name, module, "shared class registered");
                Ok(true)
            }
        }
    }

    /// Register `module` as an exporter of package `prefix`.
    pub fn add_shared_package(&self, prefix: &str, module: &str, namespace: &Arc<Namespace>) {
        let prefix = prefix.trim().trim_end_matches('.');
        if prefix.is_empty() {
            return;
        }
        let mut exporters = self.packages.entry(prefix.to_string()).or_default();
        if !exporters.iter().any(|e| e.module() == module) {
            exporters.push(Exporter::new(module, namespace));
            trace!(package = prefix, module, "shared package registered");
        }
    }

    /// Record a symbol already produced by `module` as its exact export.
    pub fn add_resolved_class(
        &self,
        symbol: Arc<Symbol>,
        module: &str,
        namespace: &Arc<Namespace>,
    ) -> Result<Arc<Symbol>, ResolveError> {
        self.record_resolved(Exporter::new(module, namespace), symbol)
    }

    fn record_resolved(
        &self,
        owner: Exporter,
        symbol: Arc<Symbol>,
    ) -> Result<Arc<Symbol>, ResolveError> {
        match self.classes.entry(symbol.name().to_string()) {
            MapEntry::Occupied(existing) => {
                let entry = existing.get();
                if entry.owner.module() == owner.module() {
                    Ok(Arc::clone(entry.symbol.get_or_init(|| symbol)))
                } else {
                    Err(ResolveError::AmbiguousExport {
                        name: symbol.name().to_string(),
                        first: entry.owner.module().to_string(),
                        second: owner.module().to_string(),
                    })
                }
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Arc::new(SharedEntry {
                    owner,
                    symbol: OnceLock::from(Arc::clone(&symbol)),
                }));
                Ok(symbol)
            }
        }
    }

    /// Look up an exported symbol.
    ///
    /// `Ok(None)` is the normal "try the next step" answer. Errors are
    /// ambiguous package exports and failures inside an exporter.
    pub fn get(&self, name: &str) -> Result<Option<Arc<Symbol>>, ResolveError> {
        let exact = self.classes.get(name).map(|e| Arc::clone(e.value()));
        if let Some(entry) = exact {
            if let Some(symbol) = entry.symbol.get() {
                return Ok(Some(Arc::clone(symbol)));
            }
            if let Some(namespace) = entry.owner.namespace() {
                match namespace.find_in_classpath(name) {
                    Ok(Some(symbol)) => {
                        return Ok(Some(Arc::clone(entry.symbol.get_or_init(|| symbol))));
                    }
                    Ok(None) => debug!(
                        symbol = name,
                        module = entry.owner.module(),
                        "exported symbol not produced by its owner"
                    ),
                    Err(e) => warn!(
                        symbol = name,
                        module = entry.owner.module(),
                        error = %e,
                        "failed to load exported symbol from its owner"
                    ),
                }
            }
        }

        for prefix in package_prefixes(name) {
            let candidates = match self.packages.get(prefix) {
                Some(exporters) => exporters.value().clone(),
                None => continue,
            };

            let mut produced: Option<(Exporter, Arc<Symbol>)> = None;
            for candidate in candidates {
                let Some(namespace) = candidate.namespace() else {
                    continue;
                };
                let found = namespace
                    .find_in_classpath(name)
                    .map_err(|e| ResolveError::ExportLoad {
                        name: name.to_string(),
                        module: candidate.module().to_string(),
                        reason: e.to_string(),
                    })?;
                if let Some(symbol) = found {
                    if let Some((first, _)) = &produced {
                        return Err(ResolveError::AmbiguousExport {
                            name: name.to_string(),
                            first: first.module().to_string(),
                            second: candidate.module().to_string(),
                        });
                    }
                    produced = Some((candidate, symbol));
                }
            }

            if let Some((owner, symbol)) = produced {
                info!(
                    symbol = name,
                    package = prefix,
                    module = owner.module(),
                    "shared symbol resolved through exported package"
                );
                return self.record_resolved(owner, symbol).map(Some);
            }
        }
        Ok(None)
    }

    /// Resolve every exact entry now. Used when lazy export is disabled.
    pub fn preload_all(&self) -> Result<usize, ResolveError> {
        let names: Vec<String> = self.classes.iter().map(|e| e.key().clone()).collect();
        names.par_iter().try_for_each(|name| self.force(name).map(|_| ()))?;
        info!(symbols = names.len(), "preloaded shared symbols");
        Ok(names.len())
    }

    /// Resolve one exact entry; missing symbols are errors.
    fn force(&self, name: &str) -> Result<Option<Arc<Symbol>>, ResolveError> {
        let Some(entry) = self.classes.get(name).map(|e| Arc::clone(e.value())) else {
            return Ok(None);
        };
        if let Some(symbol) = entry.symbol.get() {
            return Ok(Some(Arc::clone(symbol)));
        }
        let Some(namespace) = entry.owner.namespace() else {
            return Ok(None);
        };
        match namespace.find_in_classpath(name)? {
            Some(symbol) => Ok(Some(Arc::clone(entry.symbol.get_or_init(|| symbol)))),
            None => Err(ResolveError::ExportMissing {
                name: name.to_string(),
                module: entry.owner.module().to_string(),
            }),
        }
    }

    /// Every exact entry that resolves, keyed by name. Failures are logged and skipped.
    pub fn exported_symbols(&self) -> BTreeMap<String, Arc<Symbol>> {
        let names: Vec<String> = self.classes.iter().map(|e| e.key().clone()).collect();
        let mut symbols = BTreeMap::new();
        for name in names {
            match self.force(&name) {
                Ok(Some(symbol)) => {
                    symbols.insert(name, symbol);
                }
                Ok(None) => {}
                Err(e) => warn!(symbol = %name, error = %e, "skipping unresolvable export"),
            }
        }
        symbols
    }

    /// Drop every exact and package entry owned by `module`. Returns the number removed.
    pub fn destroy_module(&self, module: &str) -> usize {
        let before = self.classes.len();
        self.classes.retain(|_, entry| entry.owner.module() != module);
        let mut removed = before - self.classes.len();

        for mut exporters in self.packages.iter_mut() {
            let count = exporters.len();
            exporters.retain(|e| e.module() != module);
            removed += count - exporters.len();
        }
        self.packages.retain(|_, exporters| !exporters.is_empty());

        debug!(module, removed, "shared class entries destroyed");
        removed
    }

    /// Get the owning module of an exact entry.
    pub fn owner_of(&self, name: &str) -> Option<String> {
        self.classes.get(name).map(|e| e.owner.module().to_string())
    }

    /// Modules exporting package `prefix`, in registration order.
    pub fn package_exporters(&self, prefix: &str) -> Vec<String> {
        self.packages
            .get(prefix)
            .map(|e| e.iter().map(|x| x.module().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Get the number of exact entries.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.packages.is_empty()
    }

    pub fn clear(&self) {
        self.classes.clear();
        self.packages.clear();
    }
}

impl fmt::Debug for SharedClassTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedClassTable")
            .field("classes", &self.classes.len())
            .field("packages", &self.packages.len())
            .finish()
    }
}
