//! Shared fixtures for the islet integration tests
//!
//! - in-memory application, library and agent containers
//! - runtime construction with the external module directory disabled
//! - a recording [`Launcher`]
//! - on-disk module directories for the filesystem adapter
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use islet::container::{MemContainer, MemContainerBuilder, MemOpener, MANIFEST_PATH};
use islet::modules::{class_entry_path, EXPORT_PACKAGES, LOAD_FROM_OWNER, MODULE_NAME};
use islet::runtime::{BootContext, LaunchError, Launcher};
use islet::{ContainerUrl, Namespace, Runtime, RuntimeConfig, Symbol};

/// Default configuration without an external module directory.
pub fn config() -> RuntimeConfig {
    RuntimeConfig {
        module_dir: None,
        ..RuntimeConfig::default()
    }
}

/// A library module builder named `name`.
pub fn library(name: &str) -> MemContainerBuilder {
    MemContainer::builder().module_name(name)
}

/// A library that delegates imports to the business namespace.
pub fn delegating_library(name: &str) -> MemContainerBuilder {
    library(name).attribute(LOAD_FROM_OWNER, "true")
}

/// A library exporting the given package prefixes.
pub fn package_exporter(name: &str, packages: &[&str]) -> MemContainerBuilder {
    library(name).attribute(EXPORT_PACKAGES, packages.join(","))
}

/// An application container embedding `modules` under `modules/<name>`.
pub fn app(modules: Vec<(&str, MemContainerBuilder)>) -> MemContainerBuilder {
    modules
        .into_iter()
        .fold(MemContainer::builder(), |app, (name, module)| {
            app.nested(&format!("modules/{}", name), module)
        })
}

/// Registers `builder` at `url` and returns the URL.
pub fn register(opener: &MemOpener, url: &str, builder: MemContainerBuilder) -> ContainerUrl {
    opener.register(builder.build(url))
}

/// A runtime in unit-test mode over `app` and a business classpath.
pub fn runtime(
    app: MemContainerBuilder,
    business: MemContainerBuilder,
    configure: impl FnOnce(&MemOpener, BootContext) -> BootContext,
) -> Runtime {
    runtime_with(config(), app, business, configure)
}

pub fn runtime_with(
    config: RuntimeConfig,
    app: MemContainerBuilder,
    business: MemContainerBuilder,
    configure: impl FnOnce(&MemOpener, BootContext) -> BootContext,
) -> Runtime {
    let opener = Arc::new(MemOpener::new());
    let business_url = register(&opener, "mem:business", business);
    let boot = BootContext::new(app.build("mem:app"))
        .with_business_classpath(vec![business_url])
        .unit_test(true);
    let boot = configure(&opener, boot);
    Runtime::new(config, boot, opener)
}

/// Records every launch it receives.
#[derive(Default)]
pub struct RecordingLauncher {
    pub launches: Mutex<Vec<(String, Vec<String>, String)>>,
    pub fail_with: Option<String>,
}

impl RecordingLauncher {
    pub fn failing(reason: &str) -> Self {
        Self {
            launches: Mutex::new(Vec::new()),
            fail_with: Some(reason.to_string()),
        }
    }
}

impl Launcher for RecordingLauncher {
    fn launch(
        &self,
        entry: Arc<Symbol>,
        args: &[String],
        namespace: &Arc<Namespace>,
    ) -> Result<(), LaunchError> {
        self.launches.lock().push((
            entry.name().to_string(),
            args.to_vec(),
            namespace.name().to_string(),
        ));
        match &self.fail_with {
            Some(reason) => Err(reason.clone().into()),
            None => Ok(()),
        }
    }
}

/// Write an unpacked module directory `root/dir` with a manifest and symbols.
pub fn write_module(root: &Path, dir: &str, name: &str, symbols: &[(&str, &str)]) -> PathBuf {
    let module = root.join(dir);
    let manifest = module.join(MANIFEST_PATH);
    fs::create_dir_all(manifest.parent().expect("manifest has a parent")).expect("create META-INF");
    fs::write(&manifest, format!("{}: {}\n", MODULE_NAME, name)).expect("write manifest");
    for (symbol, contents) in symbols {
        let path = module.join(class_entry_path(symbol));
        fs::create_dir_all(path.parent().expect("symbol has a parent")).expect("create package dirs");
        fs::write(&path, contents).expect("write symbol");
    }
    module
}
