//! Resolved symbols
//!
//! A `Symbol` is the definition a namespace produced for a name. Identity is
//! pointer identity: two lookups that return the same `Arc<Symbol>` resolved
//! to the same definition, which is what the shared export table guarantees.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::container::{Bytes, ResourceLocation};

/// A symbol definition produced by exactly one namespace.
pub struct Symbol {
    name: String,
    /// Module whose namespace defined the symbol.
    module: String,
    location: ResourceLocation,
    digest: u64,
    bytes: Bytes,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        location: ResourceLocation,
        bytes: Bytes,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            location,
            digest: hash_bytes(&bytes),
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the name of the defining module.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn location(&self) -> &ResourceLocation {
        &self.location
    }

    /// Hash of the definition bytes.
    pub fn digest(&self) -> u64 {
        self.digest
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Same definition, not merely equal bytes.
    pub fn same(a: &Arc<Symbol>, b: &Arc<Symbol>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("location", &self.location.to_string())
            .field("digest", &format_args!("{:016x}", self.digest))
            .finish()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (module {})", self.name, self.module)
    }
}

/// Hash raw bytes for quick comparison.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}
