mod common;

use common::*;
use indexmap::IndexMap;
use proptest::prelude::*;
use redlilium_persist::{
    Document, Format, GraphDeserializer, GraphSerializer, IdentityRegistry, TypeRegistry, decode,
    encode, shared,
};

fn inventory() -> impl Strategy<Value = Inventory> {
    (
        proptest::collection::btree_map(any::<u32>(), "[a-z]{0,8}", 0..6),
        proptest::collection::vec("[ -~]{0,12}", 0..6),
        any::<[u8; 3]>(),
        proptest::collection::btree_set(any::<i64>(), 0..6),
        proptest::collection::vec(("[a-z]{1,6}", any::<i32>()), 0..6),
    )
        .prop_map(|(counts, tags, slots, unique, lookup)| Inventory {
            counts,
            tags,
            slots,
            unique,
            lookup: lookup.into_iter().collect::<IndexMap<_, _>>(),
            color: (0.0, 0.0, 0.0),
        })
}

proptest! {
    #[test]
    fn inventory_survives_json(original in inventory()) {
        let types = TypeRegistry::new();
        let mut registry = IdentityRegistry::new();
        let source = shared(original.clone());

        let saved = GraphSerializer::new(&types).serialize_shared(&mut registry, &source);
        prop_assert!(saved.is_clean());
        let document = saved.value.unwrap();

        for format in [Format::Json, Format::PrettyJson] {
            let bytes = encode(&document, format).unwrap();
            let decoded: Document = decode(&bytes, format).unwrap();
            prop_assert_eq!(&decoded, &document);

            let target = shared(Inventory::default());
            let loaded = GraphDeserializer::new(&types).deserialize_into(&mut registry, &target, decoded);
            prop_assert!(loaded.is_clean(), "{:?}", render(&loaded.diagnostics));
            prop_assert_eq!(&*target.read(), &original);
        }
    }

    #[test]
    fn stale_target_is_overwritten(first in inventory(), second in inventory()) {
        let types = TypeRegistry::new();
        let mut registry = IdentityRegistry::new();
        let document = GraphSerializer::new(&types)
            .serialize_shared(&mut registry, &shared(second.clone()))
            .value
            .unwrap();

        let target = shared(first);
        GraphDeserializer::new(&types).deserialize_into(&mut registry, &target, document);
        prop_assert_eq!(&*target.read(), &second);
    }
}

#[test]
fn empty_collections_are_written_as_empty_lists() {
    let types = TypeRegistry::new();
    let mut registry = IdentityRegistry::new();
    let document = GraphSerializer::new(&types)
        .serialize_shared(&mut registry, &shared(Inventory::default()))
        .value
        .unwrap();
    let json = serde_json::to_value(&document).unwrap();
    assert_eq!(json["counts"], serde_json::json!([]));
    assert_eq!(json["unique"], serde_json::json!([]));
    assert_eq!(json["slots"], serde_json::json!([0, 0, 0]));
}
