/// Islet - Module Isolation Runtime
///
/// Islet loads a set of library modules packaged as containers, gives each its
/// own symbol namespace, and lets modules share symbols only through explicit
/// exports and imports.
///
/// # Architecture
///
/// 1. **Containers** (`container` module)
///    - Uniform access to packaged bundles (directories, in-memory trees)
///    - Manifest attributes, nested containers, line-oriented list files
///
/// 2. **Module discovery** (`modules` module)
///    - Merges the external module directory, container-embedded modules and
///      supplied URLs into one de-duplicated set
///    - Recursive nested-module discovery with a configurable duplicate policy
///    - Module descriptors and the loaded-module registry
///
/// 3. **Namespaces** (`namespace` module)
///    - Per-module symbol and resource resolution driven by a strategy list
///    - Library, business, test-harness and agent policies
///
/// 4. **Sharing** (`share` and `export` modules)
///    - Shared symbol table (exact names and package prefixes)
///    - Shared resource index
///    - Parallel export with a join barrier and optional eager preload
///
/// 5. **Runtime** (`runtime` module)
///    - Startup phases, dynamic install/uninstall, queries
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use islet::config::RuntimeConfig;
/// use islet::container::{MemContainer, MemOpener};
/// use islet::runtime::{BootContext, Runtime};
///
/// let library = MemContainer::builder()
///     .module_name("greeter")
///     .symbol("com.greet.Hello", b"hello".to_vec())
///     .lines("conf/export.classes", &["com.greet.Hello"]);
/// let app = MemContainer::builder()
///     .nested("modules/greeter", library)
///     .build("mem:app");
///
/// let config = RuntimeConfig { module_dir: None, ..RuntimeConfig::default() };
/// let boot = BootContext::new(app).unit_test(true);
/// let runtime = Runtime::new(config, boot, Arc::new(MemOpener::new()));
/// runtime.start().unwrap();
///
/// let business = runtime.business_namespace().unwrap();
/// let hello = business.resolve("com.greet.Hello").unwrap();
/// assert_eq!(hello.module(), "greeter");
/// ```
pub mod config;
pub mod container;
pub mod error;
pub mod export;
pub mod logging;
pub mod modules;
pub mod namespace;
pub mod runtime;
pub mod share;

pub use config::{DuplicatePolicy, RuntimeConfig};
pub use container::{Container, ContainerOpener, ContainerUrl, ResourceLocation};
pub use error::{
    ConfigError, ContainerError, DescriptorError, ExportError, MergeError, ResolveError,
    RuntimeError,
};
pub use export::{ExportDriver, ExportSummary};
pub use modules::{Module, ModuleDescriptor, ModuleKind, ModuleRegistry};
pub use namespace::{Namespace, Symbol};
pub use runtime::{BootContext, EntryPoint, Launcher, Runtime, RuntimeState};
pub use share::{SharedClassTable, SharedResourceIndex};
