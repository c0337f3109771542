//! Manifest parsing
//!
//! `META-INF/MANIFEST.MF` holds `Key: Value` lines. A line starting with a
//! single space continues the previous value. Keys match case-insensitively.

use std::collections::BTreeMap;

use super::ContainerUrl;
use crate::error::ContainerError;

/// Manifest entry path inside a container.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Parsed manifest attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    // lower-cased key -> value
    values: BTreeMap<String, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_ascii_lowercase(), value.into());
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Comma-separated list value, blanks dropped.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `true` only for a case-insensitive `true` value.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse manifest text.
pub fn parse_manifest(container: &ContainerUrl, text: &str) -> Result<Attributes, ContainerError> {
    let mut attrs = Attributes::new();
    let mut current: Option<(String, String)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if let Some(continued) = line.strip_prefix(' ') {
            match current.as_mut() {
                Some((_, value)) => value.push_str(continued),
                None => {
                    return Err(ContainerError::Manifest {
                        container: container.clone(),
                        line: index + 1,
                        text: line.to_string(),
                    })
                }
            }
            continue;
        }

        if let Some((key, value)) = current.take() {
            attrs.insert(&key, value);
        }
        if line.trim().is_empty() {
            continue;
        }

        match line.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                current = Some((key.trim().to_string(), value.trim_start().to_string()));
            }
            _ => {
                return Err(ContainerError::Manifest {
                    container: container.clone(),
                    line: index + 1,
                    text: line.to_string(),
                })
            }
        }
    }
    if let Some((key, value)) = current {
        attrs.insert(&key, value);
    }
    Ok(attrs)
}
