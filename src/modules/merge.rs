//! Module Merge Engine
//!
//! Builds the final, de-duplicated set of library modules from three sources:
//!
//! 1. the external module directory (best effort, lowest precedence after
//!    the supplied list is overlaid)
//! 2. modules embedded in the application container under `modules/*`
//! 3. the module URLs supplied at startup
//!
//! The supplied map is overlaid by container-embedded modules, which are in
//! turn overlaid by external-directory modules, so for a shared name the
//! external copy wins, then the embedded one, then the supplied one.
//!
//! Every top-level module may embed further modules; those are discovered
//! until no new names appear. A nested module never replaces a top-level
//! module of the same name.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::package::ModuleDescriptor;
use crate::config::DuplicatePolicy;
use crate::container::{Container, ContainerOpener, ContainerUrl, DirContainer, Entry};
use crate::error::MergeError;

/// Where a module candidate was discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleSource {
    ExternalDir,
    Container,
    Supplied,
    Nested,
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleSource::ExternalDir => "the external module directory",
            ModuleSource::Container => "the application container",
            ModuleSource::Supplied => "the supplied module list",
            ModuleSource::Nested => "a nested module",
        };
        f.write_str(s)
    }
}

/// A named module container before its descriptor is fully read.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub container: Arc<dyn Container>,
    pub source: ModuleSource,
}

/// Candidates keyed by module name.
pub type Candidates = BTreeMap<String, Candidate>;

/// A module selected by the merge, with its descriptor.
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    pub descriptor: ModuleDescriptor,
    pub container: Arc<dyn Container>,
    pub source: ModuleSource,
}

/// Discovers and de-duplicates library modules.
pub struct MergeEngine {
    opener: Arc<dyn ContainerOpener>,
    policy: DuplicatePolicy,
}

impl MergeEngine {
    pub fn new(opener: Arc<dyn ContainerOpener>, policy: DuplicatePolicy) -> Self {
        Self { opener, policy }
    }

    /// Run the whole merge and return modules ordered by priority, then name.
    pub fn merge(
        &self,
        external_dir: Option<&Path>,
        container: &dyn Container,
        supplied: &[ContainerUrl],
    ) -> Result<Vec<DiscoveredModule>, MergeError> {
        let external = match external_dir {
            Some(dir) => self.parse_external_dir(dir),
            None => Candidates::new(),
        };
        let embedded = self.parse_container(container)?;
        let mut merged = self.parse_urls(supplied)?;

        for (name, candidate) in embedded.into_iter().chain(external) {
            if let Some(replaced) = merged.insert(name.clone(), candidate) {
                debug!(
                    module = %name,
                    replaced = %replaced.container.url(),
                    "module overridden by higher-precedence source"
                );
            }
        }

        let expanded = self.expand_nested(merged)?;
        self.describe(expanded)
    }

    /// Every entry of `dir` that opens as a module. Failures are logged and skipped.
    pub fn parse_external_dir(&self, dir: &Path) -> Candidates {
        let mut candidates = Candidates::new();
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) => {
                info!(dir = %dir.display(), error = %e, "external module directory not readable, skipping");
                return candidates;
            }
        };

        let mut paths: Vec<_> = read.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();

        for path in paths {
            let container: Arc<dyn Container> = match DirContainer::open(&path) {
                Ok(c) => Arc::new(c),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping external module candidate");
                    continue;
                }
            };
            let name = match ModuleDescriptor::module_name(container.as_ref()) {
                Ok(name) => name,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping external module candidate");
                    continue;
                }
            };
            if let Some(previous) = candidates.get(&name) {
                warn!(
                    module = %name,
                    kept = %container.url(),
                    ignored = %previous.container.url(),
                    "duplicated module in external directory"
                );
            }
            candidates.insert(
                name,
                Candidate {
                    container,
                    source: ModuleSource::ExternalDir,
                },
            );
        }
        candidates
    }

    /// Modules embedded under `modules/*`. Duplicates are fatal.
    pub fn parse_container(&self, container: &dyn Container) -> Result<Candidates, MergeError> {
        let nested = container
            .nested_containers(&|e: &Entry| e.is_nested_module())
            .map_err(|source| MergeError::Nested {
                url: container.url().clone(),
                source,
            })?;
        collect_unique(nested, ModuleSource::Container)
    }

    /// Modules at the supplied URLs. Failures and duplicates are fatal.
    pub fn parse_urls(&self, urls: &[ContainerUrl]) -> Result<Candidates, MergeError> {
        let containers = urls
            .iter()
            .map(|url| {
                self.opener.open(url).map_err(|source| MergeError::Open {
                    url: url.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        collect_unique(containers, ModuleSource::Supplied)
    }

    /// Add nested modules of every candidate until no new names appear.
    ///
    /// Under [`DuplicatePolicy::LastWins`] the replaced copy is dropped along
    /// with every module only it contributed.
    pub fn expand_nested(&self, top: Candidates) -> Result<Candidates, MergeError> {
        let mut nested_found = Candidates::new();
        // Containers that introduced each nested module, by name.
        let mut parents: BTreeMap<String, Vec<ContainerUrl>> = BTreeMap::new();
        let mut frontier: Vec<Arc<dyn Container>> =
            top.values().map(|c| Arc::clone(&c.container)).collect();

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for parent in frontier {
                let live = top
                    .values()
                    .chain(nested_found.values())
                    .any(|c| c.container.url() == parent.url());
                if !live {
                    continue;
                }
                let children = parent
                    .nested_containers(&|e: &Entry| e.is_nested_module())
                    .map_err(|source| MergeError::Nested {
                        url: parent.url().clone(),
                        source,
                    })?;

                for child in children {
                    let name = ModuleDescriptor::module_name(child.as_ref())?;
                    if let Some(existing) = top.get(&name) {
                        info!(
                            module = %name,
                            nested = %child.url(),
                            kept = %existing.container.url(),
                            "nested module shadowed by top-level module"
                        );
                        continue;
                    }
                    match nested_found.get(&name) {
                        Some(existing) if existing.container.url() == child.url() => {
                            parents.entry(name).or_default().push(parent.url().clone());
                            continue;
                        }
                        Some(existing) => match self.policy {
                            DuplicatePolicy::Fail => {
                                return Err(MergeError::DuplicateNested {
                                    name,
                                    kept: existing.container.url().clone(),
                                    other: child.url().clone(),
                                });
                            }
                            DuplicatePolicy::LastWins => {
                                warn!(
                                    module = %name,
                                    kept = %child.url(),
                                    ignored = %existing.container.url(),
                                    "duplicated nested module, keeping the last one"
                                );
                                let dropped = existing.container.url().clone();
                                nested_found.remove(&name);
                                parents.remove(&name);
                                prune_subtree(&dropped, &mut nested_found, &mut parents, &mut next);
                            }
                        },
                        None => {}
                    }
                    parents.entry(name.clone()).or_default().push(parent.url().clone());
                    nested_found.insert(
                        name,
                        Candidate {
                            container: Arc::clone(&child),
                            source: ModuleSource::Nested,
                        },
                    );
                    next.push(child);
                }
            }
            frontier = next;
        }

        let mut all = top;
        all.extend(nested_found);
        Ok(all)
    }

    /// Read descriptors and order by priority, then name.
    pub fn describe(&self, candidates: Candidates) -> Result<Vec<DiscoveredModule>, MergeError> {
        let mut modules = candidates
            .into_values()
            .map(|candidate| -> Result<DiscoveredModule, MergeError> {
                let descriptor = ModuleDescriptor::read(candidate.container.as_ref())?;
                Ok(DiscoveredModule {
                    descriptor,
                    container: candidate.container,
                    source: candidate.source,
                })
            })
            .collect::<Result<Vec<_>, MergeError>>()?;
        modules.sort_by(|a, b| {
            a.descriptor
                .priority
                .cmp(&b.descriptor.priority)
                .then_with(|| a.descriptor.name.cmp(&b.descriptor.name))
        });
        info!(
            modules = modules.len(),
            names = ?modules.iter().map(|m| m.descriptor.name.as_str()).collect::<Vec<_>>(),
            "module merge complete"
        );
        Ok(modules)
    }
}

impl fmt::Debug for MergeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeEngine")
            .field("policy", &self.policy)
            .finish()
    }
}

/// Forget `dropped` and every nested module reachable only through it.
fn prune_subtree(
    dropped: &ContainerUrl,
    found: &mut Candidates,
    parents: &mut BTreeMap<String, Vec<ContainerUrl>>,
    frontier: &mut Vec<Arc<dyn Container>>,
) {
    frontier.retain(|c| c.url() != dropped);
    let orphans: Vec<String> = parents
        .iter_mut()
        .filter_map(|(name, via)| {
            via.retain(|url| url != dropped);
            via.is_empty().then(|| name.clone())
        })
        .collect();
    for name in orphans {
        parents.remove(&name);
        if let Some(orphan) = found.remove(&name) {
            debug!(module = %name, via = %dropped, "dropping module nested in a replaced duplicate");
            prune_subtree(orphan.container.url(), found, parents, frontier);
        }
    }
}

fn collect_unique(
    containers: Vec<Arc<dyn Container>>,
    source: ModuleSource,
) -> Result<Candidates, MergeError> {
    let mut candidates = Candidates::new();
    for container in containers {
        let name = ModuleDescriptor::module_name(container.as_ref())?;
        if candidates.contains_key(&name) {
            return Err(MergeError::Duplicate { name, origin: source });
        }
        candidates.insert(name, Candidate { container, source });
    }
    Ok(candidates)
}
