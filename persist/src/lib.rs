//! # RedLilium Persist
//!
//! Persistence of live, mutable object graphs with durable identities.
//!
//! ## Documents
//!
//! - [`Value`] — format-agnostic document tree
//! - [`Document`] / [`RootDocument`] — tagged entity documents and the
//!   per-object container
//! - [`Format`] — JSON (and optionally RON) text codec
//!
//! ## Identity
//!
//! - [`Uid`] — 64-bit durable identity
//! - [`IdentityRegistry`] — UID ↔ live object mapping, pending references
//! - [`Referenceable`] / [`ObjectHandle`] — objects referenced by UID
//!
//! ## Reflection
//!
//! - [`Persistable`] — entity trait, derived with `#[derive(Persistable)]`
//! - [`Schema`] / [`ReflectionIndex`] — cached member tables
//! - [`TypeRegistry`] — tag → factory
//! - [`Persist`] — member codec, with [`Ref`], [`PartRef`] and [`RefWrapper`]
//!   for references
//!
//! ## Passes
//!
//! - [`GraphSerializer`] — live graph → documents, with cycle detection
//! - [`GraphDeserializer`] — documents → live graph, with deferred references
//! - [`Outcome`] / [`Diagnostic`] — per-member problems of a pass
//!
//! ## Session
//!
//! - [`EntityStore`] — keyed document storage ([`MemoryStore`], [`FileStore`])
//! - [`Persistence`] — host facade with save/load hooks
//! - [`PersistConfig`] — TOML configuration
//!
//! See `DESIGN.md` in the repository root for architecture decisions.

extern crate self as redlilium_persist;

mod config;
mod deserializer;
mod diagnostic;
mod document;
pub mod error;
mod format;
mod handle;
pub mod identity;
mod member;
mod node;
mod persistence;
pub mod reflect;
mod serializer;
pub mod store;
mod value;

pub use config::{PersistConfig, load_config, load_or_default};
pub use deserializer::{GraphDeserializer, LoadContext, Resolution};
pub use diagnostic::{Diagnostic, MemberPath, Outcome, Problem, Segment};
pub use document::{CLASS_KEY, Document, KEY_KEY, RootDocument, VALUE_KEY};
pub use error::{ConfigError, DeserializeError, LinkError, SerializeError, StoreError};
pub use format::{Format, decode, encode};
pub use handle::{EntityHandle, ObjectHandle, Shared, WeakEntityHandle, address_of, shared};
pub use identity::{IdentityRegistry, RandomUidSource, Uid, UidSource};
pub use member::{PartRef, Persist, Ref, RefWrapper};
pub use node::{Node, Referenceable};
pub use persistence::{Persistence, Report, TrackOptions};
pub use reflect::{
    MemberFlags, MemberInfo, MemberKind, Persistable, PersistableType, ReflectionIndex, Schema,
    TypeRegistry,
};
pub use serializer::{DEFAULT_MAX_DEPTH, GraphSerializer, SaveContext, TraversalTrace};
pub use store::{EntityStore, FileStore, MemoryStore};
pub use value::{Value, from_value, to_value};

pub use redlilium_persist_macro::Persistable;

#[doc(hidden)]
pub use serde;
