//! Error taxonomy
//!
//! One enum per subsystem, all converging on [`RuntimeError`]:
//! - [`ContainerError`] - reading packaged containers
//! - [`DescriptorError`] - required/malformed manifest attributes (fatal)
//! - [`MergeError`] - module discovery and de-duplication (fatal)
//! - [`ResolveError`] - symbol resolution; "not found" only surfaces after the last step
//! - [`ExportError`] - publishing exports into the shared tables (fatal)
//! - [`ConfigError`] - loading `islet.toml` and `ISLET_*` overrides
//!
//! Every fatal message names the module and the symbol or field involved.

use std::path::PathBuf;

use thiserror::Error;

use crate::container::ContainerUrl;
use crate::modules::ModuleSource;

/// Errors raised by container adapters.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is not a container")]
    NotAContainer(ContainerUrl),

    #[error("no container registered at '{0}'")]
    NotFound(ContainerUrl),

    #[error("container '{container}' has no nested container at '{entry}'")]
    NestedNotFound { container: ContainerUrl, entry: String },

    #[error("invalid entry path '{path}' in container '{container}'")]
    InvalidPath { container: ContainerUrl, path: String },

    #[error("malformed manifest in '{container}' at line {line}: {text}")]
    Manifest {
        container: ContainerUrl,
        line: usize,
        text: String,
    },
}

/// Errors raised while turning a container's manifest into a module descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("invalid module manifest, blank Module-Name in '{0}'")]
    MissingName(ContainerUrl),

    #[error("module '{module}' declares malformed Module-Priority '{value}'")]
    InvalidPriority { module: String, value: String },

    #[error("failed to read manifest of '{url}': {source}")]
    Manifest {
        url: ContainerUrl,
        #[source]
        source: ContainerError,
    },

    #[error("failed to read {path} of module '{module}': {source}")]
    ListFile {
        module: String,
        path: &'static str,
        #[source]
        source: ContainerError,
    },
}

/// Errors raised by the merge engine.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("failed to open module container '{url}': {source}")]
    Open {
        url: ContainerUrl,
        #[source]
        source: ContainerError,
    },

    #[error("failed to list nested modules of '{url}': {source}")]
    Nested {
        url: ContainerUrl,
        #[source]
        source: ContainerError,
    },

    #[error("duplicated module '{name}' found in {origin}")]
    Duplicate { name: String, origin: ModuleSource },

    #[error(
        "duplicated nested module '{name}': '{kept}' and '{other}' both declare it; \
         put the module on the supplied module list to resolve the conflict"
    )]
    DuplicateNested {
        name: String,
        kept: ContainerUrl,
        other: ContainerUrl,
    },
}

/// Errors raised while resolving a symbol or resource.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("symbol name is blank")]
    BlankName,

    #[error("symbol {name} not found in module {module}")]
    NotFound { name: String, module: String },

    #[error("could not load provided symbol {name} of module {module} from the business namespace: {reason}")]
    Provided {
        name: String,
        module: String,
        reason: String,
    },

    #[error("failed to load harness symbol {name} from the platform namespace")]
    Harness { name: String },

    #[error("symbol export conflicted, {name} is exported by module {first} and {second}")]
    AmbiguousExport {
        name: String,
        first: String,
        second: String,
    },

    #[error("failed to export symbol {name} from module {module}: {reason}")]
    ExportLoad {
        name: String,
        module: String,
        reason: String,
    },

    #[error("exported symbol {name} declared by module {module} could not be loaded")]
    ExportMissing { name: String, module: String },

    #[error("failed to read {name} in module {module}: {source}")]
    Container {
        name: String,
        module: String,
        #[source]
        source: ContainerError,
    },
}

/// Errors raised by the export driver and the shared tables.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("symbol export conflicted, {name} is exported by module {existing} and {incoming}")]
    Conflict {
        name: String,
        existing: String,
        incoming: String,
    },

    #[error("module '{0}' has no namespace attached")]
    NoNamespace(String),

    #[error("module '{0}' has no archive to read export lists from")]
    NoArchive(String),

    #[error("failed to read {path} of module '{module}': {source}")]
    ListFile {
        module: String,
        path: &'static str,
        #[source]
        source: ContainerError,
    },

    #[error("failed to spawn export worker for module '{module}': {source}")]
    Spawn {
        module: String,
        #[source]
        source: std::io::Error,
    },

    #[error("export worker for module '{module}' panicked")]
    WorkerPanicked { module: String },

    #[error("module export timed out after {waited_ms} ms; still pending: {}", .pending.join(", "))]
    Timeout { waited_ms: u64, pending: Vec<String> },

    #[error("eager preload of shared symbols failed: {0}")]
    Preload(#[source] ResolveError),
}

/// Errors raised while loading runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

/// Top-level error of the runtime API.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("duplicated module found for module name: {0}")]
    DuplicateModule(String),

    #[error("runtime is not started")]
    NotStarted,

    #[error("runtime failed to start earlier and cannot be restarted")]
    Terminal,

    #[error("runtime has been stopped")]
    Stopped,

    #[error("module '{0}' is not a library module and cannot be destroyed")]
    NotDestroyable(String),

    #[error("no entry point configured, could not start business module '{0}'")]
    MissingEntryPoint(String),

    #[error("entry point '{entry}' of the business module failed: {reason}")]
    Launch { entry: String, reason: String },
}
