// tests/watch_registry.rs

mod common;
use crate::common::{dev_project, resolve, BuildDecl};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use buildwatch::watch::{Detach, OnBatch, WatchDescriptor, WatchFilter, WatchRegistry};

struct CountingDetach(Arc<AtomicUsize>);

impl Detach for CountingDetach {
    fn detach(self: Box<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn descriptor(config: Arc<buildwatch::config::BuildConfig>) -> WatchDescriptor {
    let filter = WatchFilter::new(&config.reload_options, &config.watch_paths).unwrap();
    let handler: OnBatch = Arc::new(|_| {});
    WatchDescriptor::new(config, filter, handler)
}

#[test]
fn registering_twice_keeps_the_first_descriptor() {
    let project = dev_project();
    let config = resolve(&project, "dev");
    let registry = WatchRegistry::new();

    assert!(registry.register("dev", descriptor(config.clone())));
    project.write_build(&crate::common::dev_decl().meta("debounce-ms", 99i64));
    let newer = resolve(&project, "dev");
    assert!(!registry.register("dev", descriptor(newer)));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("dev").unwrap().config, config);
}

#[test]
fn unregister_detaches_every_attachment_once() {
    let project = dev_project();
    let registry = WatchRegistry::new();
    let detached = Arc::new(AtomicUsize::new(0));

    registry.register("dev", descriptor(resolve(&project, "dev")));
    assert!(registry.attach("dev", Box::new(CountingDetach(detached.clone()))));
    assert!(registry.attach("dev", Box::new(CountingDetach(detached.clone()))));
    assert_eq!(detached.load(Ordering::SeqCst), 0);

    assert!(registry.unregister("dev"));
    assert_eq!(detached.load(Ordering::SeqCst), 2);
    assert!(!registry.unregister("dev"));
    assert!(registry.is_empty());
}

#[test]
fn attaching_to_an_absent_id_detaches_immediately() {
    let registry = WatchRegistry::new();
    let detached = Arc::new(AtomicUsize::new(0));

    assert!(!registry.attach("ghost", Box::new(CountingDetach(detached.clone()))));
    assert_eq!(detached.load(Ordering::SeqCst), 1);
}

#[test]
fn list_ids_is_sorted_and_reflects_membership() {
    let project = dev_project();
    project.write_build(&BuildDecl::new("admin"));
    project.write_build(&BuildDecl::new("tests"));
    let registry = WatchRegistry::new();

    for id in ["tests", "dev", "admin"] {
        registry.register(id, descriptor(resolve(&project, id)));
    }
    registry.unregister("tests");

    let ids: Vec<String> = registry.list_ids().into_iter().collect();
    assert_eq!(ids, ["admin", "dev"]);
    assert!(registry.contains("dev"));
    assert!(!registry.contains("tests"));
}

#[test]
fn concurrent_registration_admits_exactly_one() {
    let project = dev_project();
    let config = resolve(&project, "dev");
    let registry = Arc::new(WatchRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let desc = descriptor(config.clone());
            std::thread::spawn(move || registry.register("dev", desc))
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(registry.len(), 1);
}
