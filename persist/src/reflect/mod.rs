//! Schema tables, schema cache and type-tag registry.
//!
//! - [`Persistable`] / [`PersistableType`] — entity traits, usually derived
//! - [`Schema`] / [`MemberInfo`] — ordered persisted members of a type
//! - [`ReflectionIndex`] — per-type schema cache
//! - [`TypeRegistry`] — tag → factory for polymorphic construction

mod index;
mod persistable;
mod schema;
mod types;

pub use index::ReflectionIndex;
pub use persistable::{Persistable, PersistableType};
pub use schema::{LoadFn, MemberFlags, MemberInfo, MemberKind, SaveFn, Schema};
pub use types::{TypeEntry, TypeRegistry};
