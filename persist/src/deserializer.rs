//! Graph deserialization.
//!
//! [`GraphDeserializer`] applies tagged documents to live slots. A slot whose
//! instance already has the document's type is updated in place; otherwise a
//! fresh default instance of the tagged type is constructed and the previous
//! one is discarded. The document is authoritative.
//!
//! Reference tokens resolve through the [`IdentityRegistry`]. A token whose
//! UID is not registered yet becomes a pending reference on the enclosing
//! shared entity and is patched in when the UID appears, so roots can be
//! loaded in any order.

use std::any::TypeId;

use crate::diagnostic::{Diagnostic, MemberPath, Outcome, Problem, Segment};
use crate::document::{Document, KEY_KEY, RootDocument, VALUE_KEY};
use crate::error::DeserializeError;
use crate::handle::{EntityHandle, ObjectHandle, Shared, shared};
use crate::identity::{Holder, IdentityRegistry, Uid};
use crate::member::Persist;
use crate::reflect::{Persistable, PersistableType, TypeRegistry};
use crate::serializer::DEFAULT_MAX_DEPTH;
use crate::value::{self, Value};

/// What a reference token turned into.
#[derive(Debug)]
pub enum Resolution {
    /// Null or the unset UID: no reference.
    Null,
    /// The target is registered under the UID.
    Resolved(Uid, ObjectHandle),
    /// The target is not registered yet; a pending reference was recorded.
    Deferred(Uid),
    /// The value is not a reference token (already reported).
    Invalid,
}

struct Frame {
    holder: Holder,
    member: &'static str,
}

// ---------------------------------------------------------------------------
// LoadContext
// ---------------------------------------------------------------------------

/// State of one load pass, handed to every member codec.
pub struct LoadContext<'a> {
    types: &'a TypeRegistry,
    registry: &'a mut IdentityRegistry,
    frames: Vec<Frame>,
    path: MemberPath,
    max_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(
        types: &'a TypeRegistry,
        registry: &'a mut IdentityRegistry,
        max_depth: usize,
    ) -> Self {
        Self {
            types,
            registry,
            frames: Vec::new(),
            path: MemberPath::default(),
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

    /// Record a member-scoped failure and log it.
    pub fn report(&mut self, error: DeserializeError) {
        let diagnostic = Diagnostic::new(&self.path, Problem::Load(error));
        diagnostic.emit();
        self.diagnostics.push(diagnostic);
    }

    /// Decode plain data through serde. Null leaves the slot untouched.
    pub fn load_scalar<T: serde::de::DeserializeOwned>(&mut self, value: Value) -> Option<T> {
        if value.is_null() {
            return None;
        }
        let found = value.kind_name();
        match value::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                self.report(DeserializeError::TypeMismatch {
                    expected: std::any::type_name::<T>().to_owned(),
                    found: format!("{found} ({err})"),
                });
                None
            }
        }
    }

    /// Parse an entity document. Null yields `None` silently.
    pub fn document(&mut self, value: Value) -> Option<Document> {
        if value.is_null() {
            return None;
        }
        match Document::from_value(value) {
            Ok(document) => Some(document),
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    /// Load into an existing shared entity of type `T`.
    pub fn load_shared<T: PersistableType>(&mut self, value: Value, slot: &Shared<T>) -> bool {
        let Some(document) = self.document(value) else {
            return false;
        };
        self.accepts::<T>(document.class()) && self.apply_shared(document, slot)
    }

    /// Construct a shared entity of type `T` from a document.
    pub fn load_shared_new<T: PersistableType>(&mut self, value: Value) -> Option<Shared<T>> {
        let document = self.document(value)?;
        if !self.accepts::<T>(document.class()) {
            return None;
        }
        let handle = shared(T::default());
        self.apply_shared(document, &handle);
        Some(handle)
    }

    /// Load into a type-erased slot: reuse it if the document has its type,
    /// otherwise replace it with a fresh instance of the document's type.
    pub fn load_handle(&mut self, value: Value, slot: &mut EntityHandle) -> bool {
        let Some(document) = self.document(value) else {
            return false;
        };
        if self
            .types
            .tag_denotes(document.class(), slot.type_tag(), slot.type_id())
        {
            log::trace!("reusing '{}' in place", slot.type_tag());
            return self.apply_handle(document, slot);
        }
        match self.construct(document) {
            Some(fresh) => {
                log::trace!(
                    "replacing '{}' with '{}'",
                    slot.type_tag(),
                    fresh.type_tag()
                );
                *slot = fresh;
                true
            }
            None => false,
        }
    }

    /// Construct a type-erased entity from a document.
    pub fn load_handle_new(&mut self, value: Value) -> Option<EntityHandle> {
        let document = self.document(value)?;
        self.construct(document)
    }

    /// Load into an entity held by value.
    pub fn load_value<T: PersistableType>(&mut self, value: Value, target: &mut T) -> bool {
        let Some(document) = self.document(value) else {
            return false;
        };
        if !self.accepts::<T>(document.class()) {
            return false;
        }
        let holder = Holder::of_value(&*target);
        self.apply_members(document, target, holder)
    }

    /// Build a fresh instance of the document's type and apply the document.
    pub fn construct(&mut self, document: Document) -> Option<EntityHandle> {
        match self.types.create(document.class()) {
            Ok(handle) => {
                self.apply_handle(document, &handle);
                Some(handle)
            }
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    /// Turn a reference token into a live object, deferring it on the
    /// enclosing entity if the UID is not registered yet.
    pub fn resolve_reference(&mut self, value: Value) -> Resolution {
        let uid = match value {
            Value::Null => return Resolution::Null,
            Value::I64(token) => Uid::from_token(token),
            Value::U64(raw) => Uid::new(raw),
            Value::String(text) => match text.parse::<Uid>() {
                Ok(uid) => uid,
                Err(_) => {
                    self.report(DeserializeError::MalformedDocument(format!(
                        "'{text}' is not a reference token"
                    )));
                    return Resolution::Invalid;
                }
            },
            other => {
                self.report(DeserializeError::MalformedDocument(format!(
                    "expected a reference token, found {}",
                    other.kind_name()
                )));
                return Resolution::Invalid;
            }
        };
        if uid.is_unset() {
            return Resolution::Null;
        }
        if let Some(object) = self.registry.get(uid) {
            return Resolution::Resolved(uid, object);
        }
        self.defer(uid);
        Resolution::Deferred(uid)
    }

    /// Record a pending reference to `uid` on the member being loaded.
    pub fn defer(&mut self, uid: Uid) -> bool {
        match self.frames.last() {
            Some(frame) => self
                .registry
                .register_pending(&frame.holder, uid, frame.member),
            None => {
                log::warn!("reference {uid} read outside any entity, dropping it");
                false
            }
        }
    }

    /// Decode a sequence into fresh elements. Elements that fail to decode
    /// are skipped; null yields an empty sequence.
    pub fn load_sequence<T: Persist>(&mut self, value: Value) -> Option<Vec<T>> {
        if T::KIND.is_reference() {
            self.report(DeserializeError::UnsupportedReferenceCollection {
                type_name: std::any::type_name::<T>(),
            });
            return None;
        }
        let items = match value {
            Value::Null => return Some(Vec::new()),
            Value::List(items) => items,
            other => {
                self.report(DeserializeError::TypeMismatch {
                    expected: "list".to_owned(),
                    found: other.kind_name().to_owned(),
                });
                return None;
            }
        };
        let mut decoded = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            self.path.push(Segment::Index(index));
            if let Some(element) = T::load_new(item, self) {
                decoded.push(element);
            }
            self.path.pop();
        }
        Some(decoded)
    }

    /// Load a sequence into `items`, reusing existing elements by index.
    /// Extra elements are constructed and surplus ones dropped. An element
    /// that fails to load in place is dropped like one that fails to decode.
    pub fn load_sequence_into<T: Persist>(&mut self, value: Value, items: &mut Vec<T>) -> bool {
        if T::KIND.is_reference() {
            self.report(DeserializeError::UnsupportedReferenceCollection {
                type_name: std::any::type_name::<T>(),
            });
            return false;
        }
        let values = match value {
            Value::Null => {
                items.clear();
                return true;
            }
            Value::List(values) => values,
            other => {
                self.report(DeserializeError::TypeMismatch {
                    expected: "list".to_owned(),
                    found: other.kind_name().to_owned(),
                });
                return false;
            }
        };
        let mut kept = 0;
        for (index, item) in values.into_iter().enumerate() {
            self.path.push(Segment::Index(index));
            if kept < items.len() {
                if items[kept].load(item, self) {
                    kept += 1;
                } else {
                    log::debug!("dropping stale element at {}", self.path);
                    items.remove(kept);
                }
            } else if let Some(element) = T::load_new(item, self) {
                items.push(element);
                kept += 1;
            }
            self.path.pop();
        }
        items.truncate(kept);
        true
    }

    /// Decode a list of `{"Key":…,"Value":…}` entries, re-pairing keys and
    /// values.
    pub fn load_entries<K: Persist, V: Persist>(&mut self, value: Value) -> Option<Vec<(K, V)>> {
        if K::KIND.is_reference() || V::KIND.is_reference() {
            self.report(DeserializeError::UnsupportedReferenceCollection {
                type_name: std::any::type_name::<(K, V)>(),
            });
            return None;
        }
        let items = match value {
            Value::Null => return Some(Vec::new()),
            Value::List(items) => items,
            other => {
                self.report(DeserializeError::TypeMismatch {
                    expected: "list of key/value entries".to_owned(),
                    found: other.kind_name().to_owned(),
                });
                return None;
            }
        };
        let mut decoded = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            self.path.push(Segment::Index(index));
            if let Some(entry) = self.load_entry(item) {
                decoded.push(entry);
            }
            self.path.pop();
        }
        Some(decoded)
    }

    /// Decode one `{"Key":…,"Value":…}` entry.
    pub fn load_entry<K: Persist, V: Persist>(&mut self, value: Value) -> Option<(K, V)> {
        if value.is_null() {
            return None;
        }
        let Value::Map(fields) = value else {
            self.report(DeserializeError::TypeMismatch {
                expected: "key/value entry".to_owned(),
                found: value.kind_name().to_owned(),
            });
            return None;
        };
        let mut key = None;
        let mut val = None;
        for (name, field) in fields {
            match name.as_str() {
                KEY_KEY => key = Some(field),
                VALUE_KEY => val = Some(field),
                _ => self.report(DeserializeError::MalformedDocument(format!(
                    "unexpected '{name}' in key/value entry"
                ))),
            }
        }
        let (Some(key), Some(val)) = (key, val) else {
            self.report(DeserializeError::MalformedDocument(format!(
                "key/value entry needs both '{KEY_KEY}' and '{VALUE_KEY}'"
            )));
            return None;
        };

        self.path.push(Segment::Key);
        let key = K::load_new(key, self);
        self.path.pop();
        self.path.push(Segment::Value);
        let val = V::load_new(val, self);
        self.path.pop();
        Some((key?, val?))
    }

    /// Whether a document tagged `tag` may fill a slot declared as `T`.
    fn accepts<T: PersistableType>(&mut self, tag: &str) -> bool {
        if self.types.tag_denotes(tag, T::tag(), TypeId::of::<T>()) {
            return true;
        }
        let error = match self.types.resolve(tag) {
            Some(_) => DeserializeError::TypeMismatch {
                expected: T::tag().to_owned(),
                found: tag.to_owned(),
            },
            None => DeserializeError::UnknownType {
                tag: tag.to_owned(),
            },
        };
        self.report(error);
        false
    }

    fn apply_shared<T: PersistableType>(&mut self, document: Document, handle: &Shared<T>) -> bool {
        let holder = Holder::of_shared(handle);
        let Some(mut guard) = handle.try_write() else {
            self.report(DeserializeError::ReentrantLoad { type_tag: T::tag() });
            return false;
        };
        self.apply_members(document, &mut *guard, holder)
    }

    fn apply_handle(&mut self, document: Document, handle: &EntityHandle) -> bool {
        let holder = Holder::Shared {
            entity: handle.downgrade(),
            type_tag: handle.type_tag(),
        };
        let Some(mut guard) = handle.try_write() else {
            self.report(DeserializeError::ReentrantLoad {
                type_tag: handle.type_tag(),
            });
            return false;
        };
        self.apply_members(document, &mut *guard, holder)
    }

    /// Apply every member of `document` to `entity`. Unknown members are
    /// reported and skipped; the rest still load.
    fn apply_members(
        &mut self,
        document: Document,
        entity: &mut dyn Persistable,
        holder: Holder,
    ) -> bool {
        if self.frames.len() >= self.max_depth {
            self.report(DeserializeError::DepthLimitExceeded {
                limit: self.max_depth,
            });
            return false;
        }
        let schema = self.types.index().schema_of(entity);
        self.frames.push(Frame { holder, member: "" });

        let (_, members) = document.into_parts();
        for (name, value) in members {
            let Some(member) = schema.member(&name) else {
                self.report(DeserializeError::UnknownMember {
                    member: name,
                    type_tag: schema.tag(),
                });
                continue;
            };
            if let Some(frame) = self.frames.last_mut() {
                frame.member = member.name();
            }
            self.path.push(Segment::Member(member.name()));
            member.load(entity.as_any_mut(), value, self);
            self.path.pop();
        }

        self.frames.pop();
        log::trace!("loaded '{}'", schema.tag());
        true
    }

    fn finish<T>(self, value: T) -> Outcome<T> {
        Outcome {
            value,
            diagnostics: self.diagnostics,
        }
    }
}

// ---------------------------------------------------------------------------
// GraphDeserializer
// ---------------------------------------------------------------------------

/// Applies documents to live slots.
pub struct GraphDeserializer<'t> {
    types: &'t TypeRegistry,
    max_depth: usize,
}

impl<'t> GraphDeserializer<'t> {
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

    /// Load a document into a polymorphic slot. An empty slot, or one holding
    /// a different type, receives a freshly constructed instance.
    pub fn deserialize(
        &self,
        registry: &mut IdentityRegistry,
        slot: &mut Option<EntityHandle>,
        document: Document,
    ) -> Outcome<()> {
        let mut ctx = LoadContext::new(self.types, registry, self.max_depth);
        let value = document.into_value();
        match slot {
            Some(existing) => {
                ctx.load_handle(value, existing);
            }
            None => *slot = ctx.load_handle_new(value),
        }
        ctx.finish(())
    }

    /// Load a document into an existing typed entity.
    pub fn deserialize_into<T: PersistableType>(
        &self,
        registry: &mut IdentityRegistry,
        target: &Shared<T>,
        document: Document,
    ) -> Outcome<()> {
        let mut ctx = LoadContext::new(self.types, registry, self.max_depth);
        ctx.load_shared(document.into_value(), target);
        ctx.finish(())
    }

    /// Load every part document into a referenceable object. Parts are found
    /// by type tag; missing ones are constructed and attached.
    pub fn load_object(
        &self,
        registry: &mut IdentityRegistry,
        object: &ObjectHandle,
        root: RootDocument,
    ) -> Outcome<()> {
        let mut ctx = LoadContext::new(self.types, registry, self.max_depth);
        let parts = object.parts();
        for document in root {
            let existing = parts
                .iter()
                .find(|p| {
                    ctx.types
                        .tag_denotes(document.class(), p.type_tag(), p.type_id())
                })
                .cloned();
            match existing {
                Some(part) => {
                    ctx.apply_handle(document, &part);
                }
                None => {
                    let tag = document.class().to_owned();
                    if let Some(part) = ctx.construct(document)
                        && !object.attach(part)
                    {
                        log::warn!("{object:?} refused a new '{tag}' part");
                    }
                }
            }
        }
        if let Some(uid) = ctx.registry.uid_of(object) {
            ctx.registry.parts_changed(uid);
        }
        ctx.finish(())
    }
}
