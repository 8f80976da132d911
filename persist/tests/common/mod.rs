#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use redlilium_persist::{
    Diagnostic, EntityHandle, Node, PartRef, Persistable, Ref, RefWrapper, Shared,
};

#[derive(Debug, Default, Clone, PartialEq, Persistable)]
#[persist(tag = "test::Health")]
pub struct Health {
    #[save]
    pub current: i32,
    #[save]
    pub max: i32,
    pub regen_scratch: f32,
}

#[derive(Debug, Default, Persistable)]
#[persist(tag = "test::Peer")]
pub struct Peer {
    #[save]
    pub name: String,
    #[save]
    pub peer: Ref<Node>,
}

#[derive(Default, Persistable)]
#[persist(tag = "test::Link")]
pub struct Link {
    #[save]
    pub label: String,
    #[save]
    pub next: Option<Shared<Link>>,
}

#[derive(Debug, Default, Clone, PartialEq, Persistable)]
#[persist(tag = "test::Inventory")]
pub struct Inventory {
    #[save]
    pub counts: BTreeMap<u32, String>,
    #[save]
    pub tags: Vec<String>,
    #[save]
    pub slots: [u8; 3],
    #[save]
    pub unique: BTreeSet<i64>,
    #[save]
    pub lookup: IndexMap<String, i32>,
    #[save(scalar, rename = "tint")]
    pub color: (f32, f32, f32),
}

#[derive(Default, Persistable)]
#[persist(tag = "test::Holder")]
pub struct Holder {
    #[save(polymorphic)]
    pub item: Option<EntityHandle>,
    #[save]
    pub health: Option<Shared<Health>>,
    #[save]
    pub embedded: Health,
}

#[derive(Default, Persistable)]
#[persist(tag = "test::Squad")]
pub struct Squad {
    #[save]
    pub members: Vec<Shared<RefWrapper<Node>>>,
}

#[derive(Default, Persistable)]
#[persist(tag = "test::RawRefs")]
pub struct RawRefs {
    #[save]
    pub targets: Vec<Ref<Node>>,
}

#[derive(Default, Persistable)]
#[persist(tag = "test::Watcher")]
pub struct Watcher {
    #[save]
    pub target: PartRef<Health>,
}

#[derive(Debug, Default, PartialEq, Persistable)]
pub struct Score(#[save] pub u32, pub f32);

/// Every load diagnostic rendered as text, for readable assertions.
pub fn render(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics.iter().map(ToString::to_string).collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
