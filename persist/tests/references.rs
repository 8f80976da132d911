mod common;

use std::sync::Arc;

use common::*;
use redlilium_persist::{
    Document, EntityHandle, GraphDeserializer, GraphSerializer, IdentityRegistry, Node,
    ObjectHandle, PartRef, PersistableType, Ref, RefWrapper, RootDocument, SerializeError,
    Shared, TypeRegistry, Uid, Value, shared,
};

fn root_of(document: Document) -> RootDocument {
    let mut root = RootDocument::new();
    root.insert(document);
    root
}

fn peer_of(node: &Shared<Node>) -> Shared<Peer> {
    node.read().get::<Peer>().unwrap()
}

#[test]
fn reference_is_written_as_uid_token() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::with_source(|| 1002u64);
    let target = shared(Node::new("target"));
    let peer = shared(Peer {
        name: "p".into(),
        peer: Ref::new(target.clone()),
    });

    let document = GraphSerializer::new(&types)
        .serialize_shared(&mut registry, &peer)
        .value
        .unwrap();
    assert_eq!(document.get("peer"), Some(&Value::I64(1002)));
    let registered = registry.get(Uid::new(1002)).unwrap();
    assert!(registered.ptr_eq(&ObjectHandle::from_shared(target)));
}

#[test]
fn forward_reference_resolves_on_registration() {
    common::init_logging();
    let types = TypeRegistry::new().with::<Peer>();
    let mut registry = IdentityRegistry::new();

    let node1 = shared(Node::new("one").with(Peer::default()));
    let obj1 = ObjectHandle::from_shared(node1.clone());
    registry.refresh(&obj1, Uid::new(1001));

    let root = root_of(
        Document::new(Peer::tag())
            .with("name", Value::from("first"))
            .with("peer", Value::I64(1002)),
    );
    let outcome = GraphDeserializer::new(&types).load_object(&mut registry, &obj1, root);
    assert!(outcome.is_clean(), "{:?}", render(&outcome.diagnostics));

    let peer = peer_of(&node1);
    assert_eq!(peer.read().name, "first");
    assert!(!peer.read().peer.is_set());
    assert_eq!(registry.pending_for(Uid::new(1002)).len(), 1);
    assert_eq!(registry.pending_for(Uid::new(1002))[0].member(), "peer");

    let node2 = shared(Node::new("two"));
    let obj2 = ObjectHandle::from_shared(node2.clone());
    assert_eq!(registry.refresh(&obj2, Uid::new(1002)), 1);
    assert!(peer.read().peer.points_to(&node2));
    assert_eq!(registry.pending_count(), 0);
}

#[test]
fn reference_to_registered_object_resolves_immediately() {
    let types = TypeRegistry::new().with::<Peer>();
    let mut registry = IdentityRegistry::new();
    let target = shared(Node::new("target"));
    registry.refresh(&ObjectHandle::from_shared(target.clone()), Uid::new(7));

    let holder = shared(Peer::default());
    let outcome = GraphDeserializer::new(&types).deserialize_into(
        &mut registry,
        &holder,
        Document::new(Peer::tag()).with("peer", Value::from("7")),
    );
    assert!(outcome.is_clean());
    assert!(holder.read().peer.points_to(&target));
}

#[test]
fn null_and_unset_tokens_clear_the_reference() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::new();
    let holder = shared(Peer {
        name: String::new(),
        peer: Ref::new(shared(Node::new("old"))),
    });

    GraphDeserializer::new(&types).deserialize_into(
        &mut registry,
        &holder,
        Document::new(Peer::tag()).with("peer", Value::I64(0)),
    );
    assert!(!holder.read().peer.is_set());
    assert_eq!(registry.pending_count(), 0);
}

#[test]
fn malformed_token_is_reported() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::new();
    let holder = shared(Peer::default());
    let outcome = GraphDeserializer::new(&types).deserialize_into(
        &mut registry,
        &holder,
        Document::new(Peer::tag()).with("peer", Value::Bool(true)),
    );
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].path(), "peer");
}

#[test]
fn dead_holder_is_dropped_on_resolution() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::new();
    {
        let holder = shared(Peer::default());
        GraphDeserializer::new(&types).deserialize_into(
            &mut registry,
            &holder,
            Document::new(Peer::tag()).with("peer", Value::I64(55)),
        );
        assert_eq!(registry.pending_count(), 1);
    }
    let late = ObjectHandle::from_shared(shared(Node::new("late")));
    assert_eq!(registry.refresh(&late, Uid::new(55)), 0);
    assert_eq!(registry.pending_count(), 0);
}

#[test]
fn reference_wrappers_carry_collections() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::with_source({
        let mut next: u64 = 100;
        move || {
            next += 1;
            next
        }
    });
    let a = shared(Node::new("a"));
    let b = shared(Node::new("b"));
    let squad = shared(Squad {
        members: vec![
            shared(RefWrapper::new(a.clone())),
            shared(RefWrapper::new(b.clone())),
        ],
    });

    let outcome = GraphSerializer::new(&types).serialize_shared(&mut registry, &squad);
    assert!(outcome.is_clean(), "{:?}", render(&outcome.diagnostics));
    let document = outcome.value.unwrap();
    let members = document.get("members").unwrap().as_list().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].get("target"), Some(&Value::I64(101)));
    assert_eq!(members[1].get("target"), Some(&Value::I64(102)));

    // A fresh registry knows only `a`; `b` arrives later.
    let mut later = IdentityRegistry::new();
    later.refresh(&ObjectHandle::from_shared(a.clone()), Uid::new(101));
    let fresh = shared(Squad::default());
    let outcome = GraphDeserializer::new(&types).deserialize_into(&mut later, &fresh, document);
    assert!(outcome.is_clean(), "{:?}", render(&outcome.diagnostics));
    {
        let fresh = fresh.read();
        assert_eq!(fresh.members.len(), 2);
        assert!(fresh.members[0].read().target().points_to(&a));
        assert!(!fresh.members[1].read().target().is_set());
    }

    assert_eq!(later.refresh(&ObjectHandle::from_shared(b.clone()), Uid::new(102)), 1);
    assert!(fresh.read().members[1].read().target().points_to(&b));
}

#[test]
fn part_reference_points_at_owner_uid() {
    let types = TypeRegistry::new().with::<Health>().with::<Watcher>();
    let mut registry = IdentityRegistry::new();

    let hero = shared(Node::new("hero").with(Health {
        current: 3,
        max: 3,
        regen_scratch: 0.0,
    }));
    let hero_uid = registry.identity_of(&ObjectHandle::from_shared(hero.clone()));
    let health = hero.read().get::<Health>().unwrap();
    let watcher = shared(Watcher {
        target: PartRef::new(health.clone()),
    });

    let document = GraphSerializer::new(&types)
        .serialize_shared(&mut registry, &watcher)
        .value
        .unwrap();
    assert_eq!(document.get("target"), Some(&Value::I64(hero_uid.to_token())));

    let fresh = shared(Watcher::default());
    let outcome = GraphDeserializer::new(&types).deserialize_into(&mut registry, &fresh, document);
    assert!(outcome.is_clean());
    let linked = fresh.read().target.get().cloned().unwrap();
    assert!(Arc::ptr_eq(&linked, &health));
}

#[test]
fn part_reference_without_registered_owner_is_unsupported() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::new();
    let orphan = shared(Health::default());
    let watcher = shared(Watcher {
        target: PartRef::new(orphan),
    });

    let outcome = GraphSerializer::new(&types).serialize_shared(&mut registry, &watcher);
    assert_eq!(outcome.value.unwrap().get("target"), Some(&Value::Null));
    assert!(matches!(
        outcome.diagnostics[0].save_error(),
        Some(SerializeError::UnsupportedReferenceKind { .. })
    ));
}

#[test]
fn deferred_part_reference_links_the_part() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::new();
    let watcher = shared(Watcher::default());
    GraphDeserializer::new(&types).deserialize_into(
        &mut registry,
        &watcher,
        Document::new(Watcher::tag()).with("target", Value::I64(9)),
    );
    assert!(!watcher.read().target.is_set());

    let hero = shared(Node::new("hero").with(Health::default()));
    assert_eq!(
        registry.refresh(&ObjectHandle::from_shared(hero.clone()), Uid::new(9)),
        1
    );
    let health = hero.read().get::<Health>().unwrap();
    assert!(Arc::ptr_eq(
        watcher.read().target.get().unwrap(),
        &health
    ));
}

#[test]
fn part_reference_waits_while_owner_lacks_the_part() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::new();
    let hero = shared(Node::new("hero"));
    registry.refresh(&ObjectHandle::from_shared(hero.clone()), Uid::new(9));

    let watcher = shared(Watcher::default());
    let outcome = GraphDeserializer::new(&types).deserialize_into(
        &mut registry,
        &watcher,
        Document::new(Watcher::tag()).with("target", Value::I64(9)),
    );
    assert!(outcome.is_clean(), "{:?}", render(&outcome.diagnostics));
    assert!(!watcher.read().target.is_set());
    assert_eq!(registry.pending_for(Uid::new(9)).len(), 1);

    hero.write().insert(EntityHandle::new(Health::default()));
    assert_eq!(registry.parts_changed(Uid::new(9)), 1);
    let health = hero.read().get::<Health>().unwrap();
    assert!(Arc::ptr_eq(watcher.read().target.get().unwrap(), &health));
}

#[test]
fn sibling_part_loaded_later_in_the_same_pass_is_linked() {
    let types = TypeRegistry::new().with::<Health>().with::<Watcher>();
    let mut registry = IdentityRegistry::new();
    let node = shared(Node::new("self-watching"));
    let object = ObjectHandle::from_shared(node.clone());
    registry.refresh(&object, Uid::new(12));

    let mut root = RootDocument::new();
    root.insert(Document::new(Watcher::tag()).with("target", Value::I64(12)));
    root.insert(
        Document::new(Health::tag())
            .with("current", Value::I64(2))
            .with("max", Value::I64(5)),
    );
    let outcome = GraphDeserializer::new(&types).load_object(&mut registry, &object, root);
    assert!(outcome.is_clean(), "{:?}", render(&outcome.diagnostics));
    assert_eq!(registry.pending_count(), 0);

    let node = node.read();
    let health = node.get::<Health>().unwrap();
    assert_eq!(health.read().max, 5);
    let watcher = node.get::<Watcher>().unwrap();
    assert!(Arc::ptr_eq(watcher.read().target.get().unwrap(), &health));
}

#[test]
fn reference_inside_by_value_entity_is_not_deferred() {
    #[derive(Default, redlilium_persist::Persistable)]
    #[persist(tag = "test::Outer")]
    struct Outer {
        #[save]
        inner: Peer,
    }

    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::new();
    let outer = shared(Outer::default());
    let document = Document::new(Outer::tag()).with(
        "inner",
        Document::new(Peer::tag())
            .with("name", Value::from("copy"))
            .with("peer", Value::I64(404))
            .into_value(),
    );
    let outcome = GraphDeserializer::new(&types).deserialize_into(&mut registry, &outer, document);
    assert!(outcome.is_clean());
    assert_eq!(outer.read().inner.name, "copy");
    assert_eq!(registry.pending_count(), 0);
}
