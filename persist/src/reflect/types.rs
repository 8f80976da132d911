use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::error::DeserializeError;
use crate::handle::EntityHandle;
use crate::reflect::{PersistableType, ReflectionIndex};

/// Registration of one constructible type.
#[derive(Clone, Copy)]
pub struct TypeEntry {
    tag: &'static str,
    type_id: TypeId,
    type_name: &'static str,
    create: fn() -> EntityHandle,
}

impl TypeEntry {
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// A fresh default instance.
    pub fn create(&self) -> EntityHandle {
        (self.create)()
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("tag", &self.tag)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Maps type tags to factories, for constructing instances named by a
/// document.
///
/// Besides the full tag, a type also resolves by its short name (the last
/// `::` segment) as long as no other registered type shares it.
#[derive(Default)]
pub struct TypeRegistry {
    entries: BTreeMap<&'static str, TypeEntry>,
    by_type: HashMap<TypeId, &'static str>,
    short_names: HashMap<&'static str, &'static str>,
    ambiguous_names: HashSet<&'static str>,
    index: ReflectionIndex,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`. Returns `false` if it was already registered.
    pub fn register<T: PersistableType>(&mut self) -> bool {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return false;
        }
        let tag = T::tag();
        if let Some(existing) = self.entries.get(tag) {
            log::error!(
                "type tag '{tag}' is claimed by both '{}' and '{}'; keeping the first",
                existing.type_name,
                std::any::type_name::<T>()
            );
            return false;
        }

        self.entries.insert(
            tag,
            TypeEntry {
                tag,
                type_id,
                type_name: std::any::type_name::<T>(),
                create: || EntityHandle::new(T::default()),
            },
        );
        self.by_type.insert(type_id, tag);
        if let Some(short) = short_name(tag) {
            self.add_short_name(short, tag);
        }
        self.index.schema::<T>();
        log::trace!("registered persistable type '{tag}'");
        true
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: PersistableType>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Look up a tag, falling back to an unambiguous short name.
    pub fn resolve(&self, tag: &str) -> Option<&TypeEntry> {
        if let Some(entry) = self.entries.get(tag) {
            return Some(entry);
        }
        let full = self.short_names.get(tag)?;
        self.entries.get(full)
    }

    /// Construct a default instance of the type named by `tag`.
    pub fn create(&self, tag: &str) -> Result<EntityHandle, DeserializeError> {
        self.resolve(tag)
            .map(TypeEntry::create)
            .ok_or_else(|| DeserializeError::UnknownType {
                tag: tag.to_owned(),
            })
    }

    pub fn is_registered<T: PersistableType>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Whether `tag` denotes the type with id `type_id`.
    pub fn tag_denotes(&self, tag: &str, type_tag: &str, type_id: TypeId) -> bool {
        tag == type_tag || self.resolve(tag).is_some_and(|e| e.type_id == type_id)
    }

    pub fn is_ambiguous(&self, short: &str) -> bool {
        self.ambiguous_names.contains(short)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeEntry> {
        self.entries.values()
    }

    /// Schema cache shared by save and load passes using this registry.
    pub fn index(&self) -> &ReflectionIndex {
        &self.index
    }

    fn add_short_name(&mut self, short: &'static str, tag: &'static str) {
        if self.ambiguous_names.contains(short) {
            return;
        }
        if self.short_names.remove(short).is_some() {
            self.ambiguous_names.insert(short);
        } else {
            self.short_names.insert(short, tag);
        }
    }
}

/// Last path segment of a non-generic tag.
fn short_name(tag: &'static str) -> Option<&'static str> {
    if tag.contains('<') {
        return None;
    }
    let short = tag.rsplit("::").next()?;
    (short != tag).then_some(short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names() {
        assert_eq!(short_name("game::units::Player"), Some("Player"));
        assert_eq!(short_name("Player"), None);
        assert_eq!(short_name("game::Wrapper<game::Item>"), None);
    }
}
