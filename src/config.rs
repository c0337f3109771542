//! Runtime Configuration
//!
//! Configuration comes from three layers, later ones winning:
//! 1. built-in defaults ([`RuntimeConfig::default`])
//! 2. an optional `islet.toml` file
//! 3. `ISLET_*` environment variables
//!
//! ## `islet.toml`
//!
//! ```toml
//! module_dir = "/opt/app/islet_modules"
//! duplicate_nested = "last-wins"
//! lazy_export = false
//! export_timeout_ms = 30000
//! custom_import_packages = ["com.acme.logging"]
//! log_level = "debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Package prefixes every library imports from the business namespace.
pub const DEFAULT_IMPORT_PACKAGES: &[&str] = &[
    "javax",
    "org.aspectj",
    "org.slf4j",
    "ch.qos.logback",
    "org.apache.log4j",
    "org.apache.logging.log4j",
    "org.apache.logging.slf4j",
    "org.apache.commons.logging",
    "esa.commons.spi",
];

/// Framework packages visible from every linked namespace.
pub const DEFAULT_FRAMEWORK_PACKAGES: &[&str] = &[
    "islet.api",
    "islet.common",
    "islet.loader",
    "islet.support.bootstrap",
];

/// Test-harness packages the business namespace sends to the platform
/// namespace in unit-test mode.
pub const HARNESS_PACKAGES: &[&str] = &[
    "org.junit",
    "junit",
    "org.hamcrest",
    "org.testng",
    "com.beust.jcommander",
    "bsh",
    "org.apache.catalina",
    "org.apache.coyote",
    "org.apache.juli",
    "org.apache.naming",
    "org.apache.tomcat",
    "org.apache.el",
    "javax",
];

pub const DEFAULT_MODULE_DIR: &str = "islet_modules";
pub const DEFAULT_BUSINESS_NAME: &str = "business";
pub const CONFIG_FILE_NAME: &str = "islet.toml";

/// Handling of two nested modules with the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Abort the merge.
    #[default]
    Fail,
    /// Keep the module discovered last and log a warning.
    LastWins,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(DuplicatePolicy::Fail),
            "last-wins" | "last_wins" => Ok(DuplicatePolicy::LastWins),
            _ => Err(()),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// External module directory, scanned best-effort.
    pub module_dir: Option<PathBuf>,

    pub duplicate_nested: DuplicatePolicy,

    /// When `false`, every exported symbol is resolved right after export.
    pub lazy_export: bool,

    /// Whether [`DEFAULT_IMPORT_PACKAGES`] apply.
    pub import_packages_enabled: bool,

    /// Extra prefixes added to the default imports.
    pub custom_import_packages: Vec<String>,

    pub framework_packages: Vec<String>,

    /// Copied into every library module's import rules.
    pub load_from_system: bool,

    /// Upper bound for the parallel export phase; `None` waits forever.
    pub export_timeout_ms: Option<u64>,

    pub business_name: String,

    /// Default `tracing` level for the `islet` target.
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            module_dir: Some(PathBuf::from(DEFAULT_MODULE_DIR)),
            duplicate_nested: DuplicatePolicy::Fail,
            lazy_export: true,
            import_packages_enabled: true,
            custom_import_packages: Vec::new(),
            framework_packages: DEFAULT_FRAMEWORK_PACKAGES.iter().map(|s| s.to_string()).collect(),
            load_from_system: false,
            export_timeout_ms: None,
            business_name: DEFAULT_BUSINESS_NAME.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from TOML content.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    /// Defaults, then `dir/islet.toml` if it exists, then the environment.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        let config = if path.is_file() {
            Self::load_from_path(&path)?
        } else {
            Self::default()
        };
        config.apply_env()
    }

    /// Apply `ISLET_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply `ISLET_*` overrides from `lookup`.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup("ISLET_MODULE_DIR") {
            self.module_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        if let Some(value) = lookup("ISLET_DUPLICATE_NESTED") {
            self.duplicate_nested = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "ISLET_DUPLICATE_NESTED",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("ISLET_LAZY_EXPORT") {
            self.lazy_export = parse_bool("ISLET_LAZY_EXPORT", &value)?;
        }
        if let Some(value) = lookup("ISLET_IMPORT_PACKAGES_ENABLED") {
            self.import_packages_enabled = parse_bool("ISLET_IMPORT_PACKAGES_ENABLED", &value)?;
        }
        if let Some(value) = lookup("ISLET_CUSTOM_IMPORT_PACKAGES") {
            self.custom_import_packages = split_list(&value);
        }
        if let Some(value) = lookup("ISLET_LOAD_FROM_SYSTEM") {
            self.load_from_system = parse_bool("ISLET_LOAD_FROM_SYSTEM", &value)?;
        }
        if let Some(value) = lookup("ISLET_EXPORT_TIMEOUT_MS") {
            let ms = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: "ISLET_EXPORT_TIMEOUT_MS",
                    value: value.clone(),
                })?;
            self.export_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(value) = lookup("ISLET_BUSINESS_NAME") {
            if !value.trim().is_empty() {
                self.business_name = value.trim().to_string();
            }
        }
        if let Some(value) = lookup("ISLET_LOG_LEVEL") {
            self.log_level = value.trim().to_string();
        }
        Ok(self)
    }

    /// Effective default import prefixes: built-ins (if enabled) plus custom ones.
    pub fn import_packages(&self) -> Vec<String> {
        let builtin = self
            .import_packages_enabled
            .then_some(DEFAULT_IMPORT_PACKAGES)
            .unwrap_or_default();
        builtin
            .iter()
            .map(|s| s.to_string())
            .chain(self.custom_import_packages.iter().cloned())
            .collect()
    }

    pub fn export_timeout(&self) -> Option<Duration> {
        self.export_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.module_dir, Some(PathBuf::from("islet_modules")));
        assert_eq!(config.duplicate_nested, DuplicatePolicy::Fail);
        assert!(config.lazy_export);
        assert!(config.export_timeout().is_none());
        assert_eq!(config.business_name, "business");
        assert!(config.import_packages().contains(&"org.slf4j".to_string()));
    }

    #[test]
    fn test_parse_toml() {
        let config = RuntimeConfig::parse_toml(
            r#"
            duplicate_nested = "last-wins"
            lazy_export = false
            export_timeout_ms = 250
            custom_import_packages = ["com.acme.logging"]
            "#,
        )
        .unwrap();
        assert_eq!(config.duplicate_nested, DuplicatePolicy::LastWins);
        assert!(!config.lazy_export);
        assert_eq!(config.export_timeout(), Some(Duration::from_millis(250)));
        assert!(config.import_packages().contains(&"com.acme.logging".to_string()));
        assert_eq!(config.business_name, "business");
    }

    #[test]
    fn test_parse_toml_rejects_unknown_policy() {
        assert!(RuntimeConfig::parse_toml("duplicate_nested = \"random\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = RuntimeConfig::default()
            .apply_overrides(env(&[
                ("ISLET_LAZY_EXPORT", "false"),
                ("ISLET_IMPORT_PACKAGES_ENABLED", "0"),
                ("ISLET_CUSTOM_IMPORT_PACKAGES", "com.a, com.b"),
                ("ISLET_DUPLICATE_NESTED", "last-wins"),
                ("ISLET_MODULE_DIR", ""),
            ]))
            .unwrap();
        assert!(!config.lazy_export);
        assert_eq!(config.duplicate_nested, DuplicatePolicy::LastWins);
        assert_eq!(config.import_packages(), vec!["com.a", "com.b"]);
        assert_eq!(config.module_dir, None);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let err = RuntimeConfig::default()
            .apply_overrides(env(&[("ISLET_LAZY_EXPORT", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "ISLET_LAZY_EXPORT", .. }));
    }

    #[test]
    fn test_load_reads_file_in_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "business_name = \"shop\"\n").unwrap();
        let config = RuntimeConfig::load_from_path(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.business_name, "shop");
    }
}
