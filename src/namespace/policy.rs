//! Resolution policies
//!
//! Each namespace kind consults a fixed, ordered list of sources. The first
//! source that produces a symbol wins; only when every step comes up empty is
//! "not found" reported.
//!
//! # Library
//! records, platform, framework, shared exports, provided (hard failure),
//! imports from the owner (if delegating), local classpath, owner fallback
//! (if delegating), agents.
//!
//! # Business
//! records, platform, framework, shared exports, local classpath, agents.
//! In unit-test mode harness symbols go to the platform namespace first.
//!
//! # Agent
//! records, platform, framework, imports from the owner, local classpath,
//! shared exports, owner.

use crate::modules::ModuleKind;

/// One source consulted while resolving a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassStep {
    /// Test-harness prefixes redirected to the platform namespace.
    Harness,
    /// Symbols this namespace already resolved.
    Records,
    Platform,
    /// Framework-package allow-list.
    Framework,
    /// Shared export table.
    Shared,
    /// `conf/provided.classes`: must come from the owner.
    Provided,
    /// Default and declared imports from the owner.
    Imported,
    Local,
    /// The owner (business) namespace without restriction.
    Owner,
    Agents,
}

/// One source consulted while resolving a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStep {
    Platform,
    /// Declared `Import-Resources` from the owner.
    Imported,
    Local,
    /// Shared resource index.
    Exported,
    Owner,
    Agents,
}

/// Ordered steps for one namespace kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    pub classes: &'static [ClassStep],
    /// First-match resource lookup.
    pub resource: &'static [ResourceStep],
    /// Aggregated resource lookup.
    pub resources: &'static [ResourceStep],
}

impl ResolvePolicy {
    pub const LIBRARY: Self = Self {
        classes: &[
            ClassStep::Records,
            ClassStep::Platform,
            ClassStep::Framework,
            ClassStep::Shared,
            ClassStep::Provided,
            ClassStep::Imported,
            ClassStep::Local,
            ClassStep::Owner,
            ClassStep::Agents,
        ],
        resource: &[
            ResourceStep::Platform,
            ResourceStep::Imported,
            ResourceStep::Local,
            ResourceStep::Exported,
            ResourceStep::Owner,
            ResourceStep::Agents,
        ],
        resources: &[
            ResourceStep::Platform,
            ResourceStep::Imported,
            ResourceStep::Local,
            ResourceStep::Exported,
            ResourceStep::Agents,
        ],
    };

    pub const BUSINESS: Self = Self {
        classes: &[
            ClassStep::Records,
            ClassStep::Platform,
            ClassStep::Framework,
            ClassStep::Shared,
            ClassStep::Local,
            ClassStep::Agents,
        ],
        resource: BUSINESS_RESOURCES,
        resources: BUSINESS_RESOURCES,
    };

    pub const TEST_HARNESS: Self = Self {
        classes: &[
            ClassStep::Harness,
            ClassStep::Records,
            ClassStep::Platform,
            ClassStep::Framework,
            ClassStep::Shared,
            ClassStep::Local,
            ClassStep::Agents,
        ],
        resource: BUSINESS_RESOURCES,
        resources: BUSINESS_RESOURCES,
    };

    pub const AGENT: Self = Self {
        classes: &[
            ClassStep::Records,
            ClassStep::Platform,
            ClassStep::Framework,
            ClassStep::Imported,
            ClassStep::Local,
            ClassStep::Shared,
            ClassStep::Owner,
        ],
        resource: AGENT_RESOURCES,
        resources: AGENT_RESOURCES,
    };

    /// Platform and container namespaces only see their own classpath.
    pub const STANDALONE: Self = Self {
        classes: &[ClassStep::Records, ClassStep::Local],
        resource: &[ResourceStep::Local],
        resources: &[ResourceStep::Local],
    };

    pub fn for_kind(kind: ModuleKind, unit_test: bool) -> Self {
        match kind {
            ModuleKind::Library => Self::LIBRARY,
            ModuleKind::Business if unit_test => Self::TEST_HARNESS,
            ModuleKind::Business => Self::BUSINESS,
            ModuleKind::Agent => Self::AGENT,
            ModuleKind::Platform | ModuleKind::Container => Self::STANDALONE,
        }
    }
}

const BUSINESS_RESOURCES: &[ResourceStep] = &[
    ResourceStep::Platform,
    ResourceStep::Local,
    ResourceStep::Exported,
    ResourceStep::Agents,
];

const AGENT_RESOURCES: &[ResourceStep] = &[
    ResourceStep::Platform,
    ResourceStep::Local,
    ResourceStep::Exported,
    ResourceStep::Owner,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn position(steps: &[ClassStep], step: ClassStep) -> usize {
        steps.iter().position(|s| *s == step).unwrap()
    }

    #[test]
    fn test_library_provided_before_local() {
        let steps = ResolvePolicy::LIBRARY.classes;
        assert!(position(steps, ClassStep::Shared) < position(steps, ClassStep::Provided));
        assert!(position(steps, ClassStep::Provided) < position(steps, ClassStep::Imported));
        assert!(position(steps, ClassStep::Imported) < position(steps, ClassStep::Local));
        assert_eq!(*steps.last().unwrap(), ClassStep::Agents);
    }

    #[test]
    fn test_agent_local_before_shared() {
        let steps = ResolvePolicy::AGENT.classes;
        assert!(position(steps, ClassStep::Local) < position(steps, ClassStep::Shared));
        assert!(!steps.contains(&ClassStep::Agents));
    }

    #[test]
    fn test_harness_only_in_unit_test_mode() {
        assert_eq!(
            ResolvePolicy::for_kind(ModuleKind::Business, true).classes[0],
            ClassStep::Harness
        );
        assert!(!ResolvePolicy::for_kind(ModuleKind::Business, false)
            .classes
            .contains(&ClassStep::Harness));
    }

    #[test]
    fn test_library_aggregate_skips_owner() {
        assert!(ResolvePolicy::LIBRARY.resource.contains(&ResourceStep::Owner));
        assert!(!ResolvePolicy::LIBRARY.resources.contains(&ResourceStep::Owner));
    }
}
