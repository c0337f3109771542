//! Optional `tracing` subscriber setup for hosts that do not install their own.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::RuntimeConfig;

/// Filter directive for the configured level, e.g. `islet=info`.
pub fn default_directive(config: &RuntimeConfig) -> String {
    let level = config.log_level.trim();
    let level = if level.is_empty() { "info" } else { level };
    format!("islet={}", level.to_ascii_lowercase())
}

/// Install a fmt subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns false when a global subscriber is already set.
pub fn init(config: &RuntimeConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let mut config = RuntimeConfig::default();
        assert_eq!(default_directive(&config), "islet=info");
        config.log_level = " DEBUG ".to_string();
        assert_eq!(default_directive(&config), "islet=debug");
        config.log_level = String::new();
        assert_eq!(default_directive(&config), "islet=info");
    }

    #[test]
    fn test_init_twice() {
        let config = RuntimeConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
