//! Symbol Name and Package Paths
//!
//! Symbol names are dotted (`com.acme.rpc.Client`). Packages are the dotted
//! prefixes of a name. Matching is done on whole segments, so the prefix
//! `com.acme` covers `com.acme.Foo` and `com.acme.rpc.Bar` but not
//! `com.acmecorp.Baz`.

/// Entry path of a symbol's definition: `a.b.C` -> `a/b/C.class`.
pub fn class_entry_path(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

/// Immediate package of a symbol, `None` for top-level names.
pub fn parent_package(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(package, _)| package)
}

/// Every enclosing package, most specific first.
///
/// `com.acme.rpc.Client` yields `com.acme.rpc`, `com.acme`, `com`.
pub fn package_prefixes(name: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent_package(name), |p| parent_package(*p))
}

/// Whether `name` lies inside the package `prefix` (or equals it).
pub fn matches_package(name: &str, prefix: &str) -> bool {
    let prefix = prefix.trim().trim_end_matches('.');
    if prefix.is_empty() {
        return false;
    }
    match name.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// Whether `name` lies inside any of `prefixes`.
pub fn matches_any<S: AsRef<str>>(name: &str, prefixes: &[S]) -> bool {
    prefixes.iter().any(|p| matches_package(name, p.as_ref()))
}

/// Normalize a package prefix as written in a manifest or list file.
pub fn normalize_package(prefix: &str) -> Option<String> {
    let prefix = prefix.trim().trim_end_matches(".*").trim_end_matches('.');
    if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    }
}
