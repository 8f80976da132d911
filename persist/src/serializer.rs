//! Graph serialization.
//!
//! [`GraphSerializer`] walks an entity graph through the schemas of its
//! types and produces tagged documents. Live references to referenceable
//! objects become UID tokens; an entity met again while it is still being
//! written is a cycle and its edge is written as null.

use indexmap::IndexSet;

use crate::diagnostic::{Diagnostic, MemberPath, Outcome, Problem, Segment};
use crate::document::{Document, KEY_KEY, RootDocument, VALUE_KEY};
use crate::error::SerializeError;
use crate::handle::{EntityHandle, ObjectHandle, Shared, address_of};
use crate::identity::IdentityRegistry;
use crate::member::Persist;
use crate::reflect::{Persistable, TypeRegistry};
use crate::value::{self, Value};

/// Default nesting limit for save and load passes.
pub const DEFAULT_MAX_DEPTH: usize = 128;

// ---------------------------------------------------------------------------
// TraversalTrace
// ---------------------------------------------------------------------------

/// Entities currently being written, by allocation address, in visit order.
#[derive(Debug, Default)]
pub struct TraversalTrace {
    visiting: IndexSet<usize>,
}

impl TraversalTrace {
    /// Returns `false` if the entity is already on the path.
    pub fn enter(&mut self, address: usize) -> bool {
        self.visiting.insert(address)
    }

    pub fn leave(&mut self, address: usize) {
        if self.visiting.last() == Some(&address) {
            self.visiting.pop();
        } else {
            self.visiting.shift_remove(&address);
        }
    }

    pub fn contains(&self, address: usize) -> bool {
        self.visiting.contains(&address)
    }

    pub fn len(&self) -> usize {
        self.visiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visiting.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SaveContext
// ---------------------------------------------------------------------------

/// State of one save pass, handed to every member codec.
pub struct SaveContext<'a> {
    types: &'a TypeRegistry,
    registry: &'a mut IdentityRegistry,
    trace: TraversalTrace,
    path: MemberPath,
    depth: usize,
    max_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SaveContext<'a> {
    pub(crate) fn new(
        types: &'a TypeRegistry,
        registry: &'a mut IdentityRegistry,
        max_depth: usize,
    ) -> Self {
        Self {
            types,
            registry,
            trace: TraversalTrace::default(),
            path: MemberPath::default(),
            depth: 0,
            max_depth,
            diagnostics: Vec::new(),
        }
    }

    pub fn types(&self) -> &TypeRegistry {
        self.types
    }

    pub fn registry(&mut self) -> &mut IdentityRegistry {
        self.registry
    }

    pub fn trace(&self) -> &TraversalTrace {
        &self.trace
    }

    /// Record a member-scoped failure and log it.
    pub fn report(&mut self, error: SerializeError) {
        let diagnostic = Diagnostic::new(&self.path, Problem::Save(error));
        diagnostic.emit();
        self.diagnostics.push(diagnostic);
    }

    /// Encode plain data through serde.
    pub fn save_scalar<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Value {
        match value::to_value(value) {
            Ok(value) => value,
            Err(SerializeError::FieldError { message, .. }) => {
                let field = self.path.to_string();
                self.report(SerializeError::FieldError { field, message });
                Value::Null
            }
            Err(other) => {
                self.report(other);
                Value::Null
            }
        }
    }

    /// Encode a shared entity as an embedded document.
    pub fn save_shared<T: Persistable>(&mut self, handle: &Shared<T>) -> Value {
        let address = address_of(handle);
        if self.trace.contains(address) {
            let type_tag = handle.try_read().map_or(std::any::type_name::<T>(), |e| e.type_tag());
            self.report(SerializeError::ReferenceCycle { type_tag });
            return Value::Null;
        }
        let guard = handle.read();
        self.save_document(Some(address), &*guard)
            .map_or(Value::Null, Document::into_value)
    }

    /// Encode a type-erased entity, always with its runtime type.
    pub fn save_handle(&mut self, handle: &EntityHandle) -> Value {
        let address = handle.address();
        if self.trace.contains(address) {
            self.report(SerializeError::ReferenceCycle {
                type_tag: handle.type_tag(),
            });
            return Value::Null;
        }
        let guard = handle.read();
        self.save_document(Some(address), &*guard)
            .map_or(Value::Null, Document::into_value)
    }

    /// Encode an entity held by value. By-value entities cannot form cycles
    /// and are not traced.
    pub fn save_value<T: Persistable>(&mut self, entity: &T) -> Value {
        self.save_document(None, entity)
            .map_or(Value::Null, Document::into_value)
    }

    /// Write the document of `entity`: its tag plus every persisted member.
    pub fn save_document(
        &mut self,
        address: Option<usize>,
        entity: &dyn Persistable,
    ) -> Option<Document> {
        if self.depth >= self.max_depth {
            self.report(SerializeError::DepthLimitExceeded {
                limit: self.max_depth,
            });
            return None;
        }
        if let Some(address) = address {
            self.trace.enter(address);
        }
        self.depth += 1;

        let schema = self.types.index().schema_of(entity);
        let mut document = Document::new(schema.tag());
        for member in schema.members() {
            self.path.push(Segment::Member(member.name()));
            let value = member.save(entity.as_any(), self);
            self.path.pop();
            document.push(member.name(), value);
        }

        self.depth -= 1;
        if let Some(address) = address {
            self.trace.leave(address);
        }
        Some(document)
    }

    /// Token for a whole referenceable object, registering it if needed.
    pub fn reference_token(&mut self, object: &ObjectHandle) -> Value {
        let uid = self.registry.identity_of(object);
        Value::I64(uid.to_token())
    }

    /// Token for the object owning the part at `address`.
    pub fn part_token(&mut self, address: usize, type_name: &'static str) -> Value {
        match self.registry.owner_of_part(address) {
            Some(uid) => Value::I64(uid.to_token()),
            None => {
                self.report(SerializeError::UnsupportedReferenceKind { type_name });
                Value::Null
            }
        }
    }

    /// Encode a sequence, element by element.
    pub fn save_sequence<'i, T: Persist + 'i>(
        &mut self,
        items: impl IntoIterator<Item = &'i T>,
    ) -> Value {
        if T::KIND.is_reference() {
            self.report(SerializeError::UnsupportedReferenceCollection {
                type_name: std::any::type_name::<T>(),
            });
            return Value::Null;
        }
        let mut values = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            self.path.push(Segment::Index(index));
            values.push(item.save(self));
            self.path.pop();
        }
        Value::List(values)
    }

    /// Encode a map as a list of `{"Key":…,"Value":…}` entries.
    pub fn save_map<'i, K: Persist + 'i, V: Persist + 'i>(
        &mut self,
        entries: impl IntoIterator<Item = (&'i K, &'i V)>,
    ) -> Value {
        if K::KIND.is_reference() || V::KIND.is_reference() {
            self.report(SerializeError::UnsupportedReferenceCollection {
                type_name: std::any::type_name::<(K, V)>(),
            });
            return Value::Null;
        }
        let mut values = Vec::new();
        for (index, (key, value)) in entries.into_iter().enumerate() {
            self.path.push(Segment::Index(index));
            values.push(self.save_entry(key, value));
            self.path.pop();
        }
        Value::List(values)
    }

    /// Encode one key/value pair.
    pub fn save_entry<K: Persist, V: Persist>(&mut self, key: &K, value: &V) -> Value {
        self.path.push(Segment::Key);
        let key = key.save(self);
        self.path.pop();
        self.path.push(Segment::Value);
        let value = value.save(self);
        self.path.pop();
        Value::Map(vec![
            (KEY_KEY.to_owned(), key),
            (VALUE_KEY.to_owned(), value),
        ])
    }

    fn finish<T>(self, value: T) -> Outcome<T> {
        Outcome {
            value,
            diagnostics: self.diagnostics,
        }
    }
}

// ---------------------------------------------------------------------------
// GraphSerializer
// ---------------------------------------------------------------------------

/// Produces documents from live entity graphs.
///
/// Each call runs one pass with its own traversal trace; a pass must finish
/// before the next starts, since they share the identity registry.
pub struct GraphSerializer<'t> {
    types: &'t TypeRegistry,
    max_depth: usize,
}

impl<'t> GraphSerializer<'t> {
    pub fn new(types: &'t TypeRegistry) -> Self {
        Self {
            types,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Serialize a type-erased root entity.
    pub fn serialize(
        &self,
        registry: &mut IdentityRegistry,
        root: &EntityHandle,
    ) -> Outcome<Option<Document>> {
        let mut ctx = SaveContext::new(self.types, registry, self.max_depth);
        let document = {
            let guard = root.read();
            ctx.save_document(Some(root.address()), &*guard)
        };
        ctx.finish(document)
    }

    /// Serialize a typed root entity.
    pub fn serialize_shared<T: Persistable>(
        &self,
        registry: &mut IdentityRegistry,
        root: &Shared<T>,
    ) -> Outcome<Option<Document>> {
        let mut ctx = SaveContext::new(self.types, registry, self.max_depth);
        let document = {
            let guard = root.read();
            ctx.save_document(Some(address_of(root)), &*guard)
        };
        ctx.finish(document)
    }

    /// Serialize every part of a referenceable object, keyed by type tag.
    pub fn serialize_object(
        &self,
        registry: &mut IdentityRegistry,
        object: &ObjectHandle,
    ) -> Outcome<RootDocument> {
        let mut ctx = SaveContext::new(self.types, registry, self.max_depth);
        let mut root = RootDocument::new();
        for part in object.parts() {
            let guard = part.read();
            if let Some(document) = ctx.save_document(Some(part.address()), &*guard) {
                root.insert(document);
            }
        }
        ctx.finish(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_keeps_visit_order() {
        let mut trace = TraversalTrace::default();
        assert!(trace.enter(1));
        assert!(trace.enter(2));
        assert!(!trace.enter(1));
        trace.leave(2);
        assert!(trace.contains(1));
        assert!(!trace.contains(2));
        trace.leave(1);
        assert!(trace.is_empty());
    }
}
