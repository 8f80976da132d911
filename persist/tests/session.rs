mod common;

use std::sync::Arc;

use common::*;
use redlilium_persist::{
    EntityStore, Format, IdentityRegistry, MemoryStore, Node, ObjectHandle, PartRef,
    PersistConfig, Persistence, Ref, Shared, TrackOptions, Uid, shared,
};

const FIRST: Uid = Uid::new(1001);
const SECOND: Uid = Uid::new(1002);

fn handle(node: &Shared<Node>) -> ObjectHandle {
    ObjectHandle::from_shared(node.clone())
}

fn peer_of(node: &Shared<Node>) -> Option<Shared<Peer>> {
    node.read().get::<Peer>()
}

/// Two nodes whose peers point at each other, saved into a memory store.
fn saved_pair() -> MemoryStore {
    let one = shared(Node::new("one"));
    let two = shared(Node::new("two"));
    one.write().insert(redlilium_persist::EntityHandle::new(Peer {
        name: "first".into(),
        peer: Ref::new(two.clone()),
    }));
    two.write().insert(redlilium_persist::EntityHandle::new(Peer {
        name: "second".into(),
        peer: Ref::new(one.clone()),
    }));

    let mut session = Persistence::with_store(MemoryStore::new(), PersistConfig::default());
    session.register::<Peer>();
    session.track(handle(&one), FIRST);
    session.track(handle(&two), SECOND);
    let report = session.on_save_requested().unwrap();
    assert!(report.is_clean(), "{:?}", render(&report.diagnostics));
    assert_eq!(report.objects, 2);

    // Break the Arc cycle so the pair is freed.
    peer_of(&one).unwrap().write().peer.clear();
    session.store().clone()
}

fn assert_linked(one: &Shared<Node>, two: &Shared<Node>) {
    let first = peer_of(one).unwrap();
    let second = peer_of(two).unwrap();
    assert_eq!(first.read().name, "first");
    assert_eq!(second.read().name, "second");
    assert!(first.read().peer.points_to(two));
    assert!(second.read().peer.points_to(one));
}

#[test]
fn load_order_does_not_matter() {
    common::init_logging();
    let store = saved_pair();

    for first_tracked in [FIRST, SECOND] {
        let one = shared(Node::new("one"));
        let two = shared(Node::new("two"));
        let mut session = Persistence::with_store(store.clone(), PersistConfig::default());
        session.register::<Peer>();

        if first_tracked == FIRST {
            session.track(handle(&one), FIRST);
            assert_eq!(session.registry().pending_count(), 1);
            session.track(handle(&two), SECOND);
        } else {
            session.track(handle(&two), SECOND);
            assert_eq!(session.registry().pending_count(), 1);
            session.track(handle(&one), FIRST);
        }

        assert_eq!(session.registry().pending_count(), 0);
        assert_linked(&one, &two);
        peer_of(&one).unwrap().write().peer.clear();
    }
}

/// A hero with health and a watcher node whose part watches that health.
fn saved_watch() -> MemoryStore {
    let hero = shared(Node::new("hero").with(Health {
        current: 7,
        max: 9,
        regen_scratch: 0.0,
    }));
    let health = hero.read().get::<Health>().unwrap();
    let watcher = shared(Node::new("watcher").with(Watcher {
        target: PartRef::new(health),
    }));

    let mut session = Persistence::with_store(MemoryStore::new(), PersistConfig::default());
    session.register::<Health>().register::<Watcher>();
    session.track(handle(&hero), FIRST);
    session.track(handle(&watcher), SECOND);
    let report = session.on_save_requested().unwrap();
    assert!(report.is_clean(), "{:?}", render(&report.diagnostics));
    session.store().clone()
}

#[test]
fn part_reference_waits_for_the_part_to_load() {
    common::init_logging();
    let store = saved_watch();

    for watcher_first in [true, false] {
        let hero = shared(Node::new("hero"));
        let watcher = shared(Node::new("watcher"));
        let mut session = Persistence::with_store(store.clone(), PersistConfig::default());
        session.register::<Health>().register::<Watcher>();

        if watcher_first {
            session.track(handle(&watcher), SECOND);
            assert_eq!(session.registry().pending_count(), 1);
            session.track(handle(&hero), FIRST);
        } else {
            session.track(handle(&hero), FIRST);
            session.track(handle(&watcher), SECOND);
        }

        assert_eq!(session.registry().pending_count(), 0);
        let health = hero.read().get::<Health>().unwrap();
        assert_eq!(health.read().current, 7);
        let watching = watcher.read().get::<Watcher>().unwrap();
        let linked = watching.read().target.get().cloned().unwrap();
        assert!(Arc::ptr_eq(&linked, &health));
    }
}

#[test]
fn identity_only_roots_are_neither_saved_nor_loaded() {
    let mut session = Persistence::with_store(MemoryStore::new(), PersistConfig::default());
    session.register::<Health>();
    let node = shared(Node::new("marker").with(Health::default()));
    let uid = session.track_with(handle(&node), Uid::UNSET, TrackOptions::IDENTITY_ONLY);

    assert!(!uid.is_unset());
    assert!(session.registry().contains(uid));
    let report = session.on_save_requested().unwrap();
    assert_eq!(report.objects, 0);
    assert!(session.store().is_empty());
}

#[test]
fn identity_needed_is_stable() {
    let mut session = Persistence::with_store(MemoryStore::new(), PersistConfig::default())
        .with_registry(IdentityRegistry::with_source(|| 31u64));
    let node = handle(&shared(Node::new("n")));
    let uid = session.on_identity_needed(&node);
    assert_eq!(uid, Uid::new(31));
    assert_eq!(session.on_identity_needed(&node), uid);
}

#[test]
fn root_without_stored_document_keeps_state() {
    let mut session = Persistence::with_store(MemoryStore::new(), PersistConfig::default());
    session.register::<Health>();
    let node = shared(Node::new("fresh").with(Health {
        current: 12,
        max: 20,
        regen_scratch: 0.0,
    }));
    session.track(handle(&node), Uid::new(5));

    let report = session.on_load_requested().unwrap();
    assert!(report.is_clean());
    let health = node.read().get::<Health>().unwrap();
    assert_eq!(health.read().current, 12);
}

#[test]
fn forget_releases_identity() {
    let mut session = Persistence::with_store(MemoryStore::new(), PersistConfig::default());
    let node = handle(&shared(Node::new("n")));
    let uid = session.track(node.clone(), Uid::new(8));
    assert!(session.is_tracked(uid));

    assert!(session.forget(uid).unwrap().ptr_eq(&node));
    assert!(!session.is_tracked(uid));
    assert!(!session.registry().contains(uid));
}

#[test]
fn file_session_round_trip() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = PersistConfig {
        save_path: dir.path().join("saves").join("world.json"),
        format: Format::PrettyJson,
        ..PersistConfig::default()
    };

    {
        let mut session = Persistence::from_config(config.clone());
        session.register::<Health>().register::<Inventory>();
        let node = shared(
            Node::new("chest")
                .with(Health {
                    current: 4,
                    max: 10,
                    regen_scratch: 1.0,
                })
                .with(Inventory {
                    tags: vec!["locked".into()],
                    ..Default::default()
                }),
        );
        session.track(handle(&node), FIRST);
        let report = session.on_save_requested().unwrap();
        assert!(report.is_clean(), "{:?}", render(&report.diagnostics));
    }
    assert!(config.save_path.exists());

    let mut session = Persistence::from_config(config);
    session.register::<Health>().register::<Inventory>();
    let node = shared(Node::new("chest"));
    session.track(handle(&node), FIRST);
    assert!(node.read().is_empty());

    let report = session.on_load_requested().unwrap();
    assert!(report.is_clean(), "{:?}", render(&report.diagnostics));
    assert_eq!(report.objects, 1);
    assert_eq!(session.store().uids(), [FIRST]);

    let node = node.read();
    assert_eq!(node.len(), 2);
    let health = node.get::<Health>().unwrap();
    assert_eq!(health.read().max, 10);
    assert_eq!(health.read().regen_scratch, 0.0);
    let inventory = node.get::<Inventory>().unwrap();
    assert_eq!(inventory.read().tags, ["locked"]);
}
