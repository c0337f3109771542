//! Shared symbol table behavior against real module namespaces.

mod common;

use std::sync::Arc;
use std::thread;

use islet::container::{MemContainer, EXPORTED_CLASSES_FILE};
use islet::{ExportError, Runtime, Symbol};

use common::{app, library, package_exporter, runtime};

fn started(modules: Vec<(&str, islet::container::MemContainerBuilder)>) -> Runtime {
    let rt = runtime(app(modules), MemContainer::builder(), |_, boot| boot);
    rt.start().unwrap();
    rt
}

#[test]
fn test_get_is_idempotent() {
    let rt = started(vec![(
        "rpc",
        library("rpc")
            .symbol("com.rpc.Client", "rpc")
            .lines(EXPORTED_CLASSES_FILE, &["com.rpc.Client"]),
    )]);
    let table = rt.shared_classes();

    let first = table.get("com.rpc.Client").unwrap().unwrap();
    let second = table.get("com.rpc.Client").unwrap().unwrap();
    assert!(Symbol::same(&first, &second));
    assert_eq!(first.module(), "rpc");
}

#[test]
fn test_concurrent_get_returns_one_symbol() {
    let rt = Arc::new(started(vec![(
        "rpc",
        library("rpc")
            .symbol("com.rpc.Client", "rpc")
            .lines(EXPORTED_CLASSES_FILE, &["com.rpc.Client"]),
    )]));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let rt = Arc::clone(&rt);
            thread::spawn(move || rt.shared_classes().get("com.rpc.Client").unwrap().unwrap())
        })
        .collect();
    let symbols: Vec<Arc<Symbol>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(symbols.windows(2).all(|w| Symbol::same(&w[0], &w[1])));
}

#[test]
fn test_second_exact_export_conflicts_and_first_owner_kept() {
    let rt = started(vec![
        ("a", library("a").symbol("x.Y", "a")),
        ("b", library("b").symbol("x.Y", "b")),
    ]);
    let table = rt.shared_classes();
    let a = rt.namespace("a").unwrap();
    let b = rt.namespace("b").unwrap();

    assert!(table.add_shared_class("x.Y", "a", &a).unwrap());
    assert!(!table.add_shared_class("x.Y", "a", &a).unwrap());
    let err = table.add_shared_class("x.Y", "b", &b).unwrap_err();
    assert!(matches!(err, ExportError::Conflict { .. }));
    assert_eq!(
        err.to_string(),
        "symbol export conflicted, x.Y is exported by module a and b"
    );
    assert_eq!(table.owner_of("x.Y").as_deref(), Some("a"));
    assert_eq!(table.get("x.Y").unwrap().unwrap().bytes(), b"a");
}

#[test]
fn test_destroy_removes_exact_and_package_entries() {
    let rt = started(vec![
        (
            "a",
            package_exporter("a", &["com.a"])
                .symbol("com.a.Util", "a")
                .symbol("com.a.Api", "a")
                .lines(EXPORTED_CLASSES_FILE, &["com.a.Api"]),
        ),
        ("b", package_exporter("b", &["com.b"]).symbol("com.b.Util", "b")),
    ]);
    let table = rt.shared_classes();
    assert_eq!(table.get("com.a.Util").unwrap().unwrap().module(), "a");
    assert_eq!(table.package_exporters("com.a"), vec!["a"]);

    let removed = table.destroy_module("a");
    assert!(removed >= 3);
    assert!(table.get("com.a.Api").unwrap().is_none());
    assert!(table.get("com.a.Util").unwrap().is_none());
    assert!(table.package_exporters("com.a").is_empty());
    assert_eq!(table.get("com.b.Util").unwrap().unwrap().module(), "b");
}

#[test]
fn test_prefix_walk_prefers_most_specific_package() {
    let rt = started(vec![
        ("outer", package_exporter("outer", &["com.acme"]).symbol("com.acme.api.Thing", "outer")),
        ("inner", package_exporter("inner", &["com.acme.api"]).symbol("com.acme.api.Thing", "inner")),
    ]);
    let thing = rt.shared_classes().get("com.acme.api.Thing").unwrap().unwrap();
    assert_eq!(thing.module(), "inner");
}

#[test]
fn test_prefix_match_respects_segment_boundaries() {
    let rt = started(vec![(
        "shared",
        package_exporter("shared", &["com.shared"]).symbol("com.sharedx.Util", "shared"),
    )]);
    assert!(rt.shared_classes().get("com.sharedx.Util").unwrap().is_none());
}
