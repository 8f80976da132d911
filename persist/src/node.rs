//! Referenceable objects.

use crate::handle::{EntityHandle, Shared};
use crate::reflect::{Persistable, PersistableType};

/// An object other entities may point to by UID instead of embedding it.
///
/// A referenceable object is a container of persistable parts. Saving it
/// writes one document per part, keyed by type tag; a reference member can
/// target either the whole object or one of its parts.
pub trait Referenceable: Send + Sync + 'static {
    /// Snapshot of the parts currently attached.
    fn parts(&self) -> Vec<EntityHandle> {
        Vec::new()
    }

    /// Attach a part constructed during load. Returns `false` when the object
    /// does not accept it.
    fn attach(&mut self, part: EntityHandle) -> bool {
        let _ = part;
        false
    }
}

/// A named bag of parts, at most one per type tag.
#[derive(Debug, Default)]
pub struct Node {
    name: String,
    parts: Vec<EntityHandle>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builder-style part insertion; returns the node for chaining.
    pub fn with<T: PersistableType>(mut self, part: T) -> Self {
        self.insert(EntityHandle::new(part));
        self
    }

    /// Insert a part, replacing an existing part with the same type tag.
    pub fn insert(&mut self, part: EntityHandle) {
        let tag = part.type_tag();
        match self.parts.iter_mut().find(|p| p.type_tag() == tag) {
            Some(slot) => *slot = part,
            None => self.parts.push(part),
        }
    }

    /// Typed access to a part.
    pub fn get<T: Persistable>(&self) -> Option<Shared<T>> {
        self.parts.iter().find_map(EntityHandle::downcast::<T>)
    }

    pub fn remove<T: Persistable>(&mut self) -> Option<Shared<T>> {
        let index = self.parts.iter().position(EntityHandle::is::<T>)?;
        self.parts.remove(index).downcast::<T>()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Referenceable for Node {
    fn parts(&self) -> Vec<EntityHandle> {
        self.parts.clone()
    }

    fn attach(&mut self, part: EntityHandle) -> bool {
        let tag = part.type_tag();
        if self.parts.iter().any(|p| p.type_tag() == tag) {
            log::warn!("node '{}' already has a '{tag}' part", self.name);
            return false;
        }
        self.parts.push(part);
        true
    }
}
