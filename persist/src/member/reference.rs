//! Reference members.
//!
//! A reference is written as the UID token of a referenceable object, never
//! as a copy of it. On load the token is looked up in the identity registry;
//! if the target is not registered yet the holder entity gets a pending
//! reference and [`Persist::link`] assigns the target once it appears.

use std::fmt;

use super::Persist;
use crate::deserializer::{LoadContext, Resolution};
use crate::error::LinkError;
use crate::handle::{ObjectHandle, Shared, address_of};
use crate::node::Referenceable;
use crate::Persistable;
use crate::reflect::MemberKind;
use crate::serializer::SaveContext;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Ref
// ---------------------------------------------------------------------------

/// Reference to a whole referenceable object.
pub struct Ref<T: Referenceable>(Option<Shared<T>>);

impl<T: Referenceable> Ref<T> {
    pub fn new(target: Shared<T>) -> Self {
        Self(Some(target))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&Shared<T>> {
        self.0.as_ref()
    }

    pub fn set(&mut self, target: Shared<T>) {
        self.0 = Some(target);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn take(&mut self) -> Option<Shared<T>> {
        self.0.take()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Whether this refers to exactly `target`.
    pub fn points_to(&self, target: &Shared<T>) -> bool {
        self.0
            .as_ref()
            .is_some_and(|h| address_of(h) == address_of(target))
    }
}

impl<T: Referenceable> Default for Ref<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: Referenceable> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Referenceable> From<Shared<T>> for Ref<T> {
    fn from(target: Shared<T>) -> Self {
        Self::new(target)
    }
}

impl<T: Referenceable> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(h) => write!(f, "Ref({:#x})", address_of(h)),
            None => f.write_str("Ref(None)"),
        }
    }
}

impl<T: Referenceable> Persist for Ref<T> {
    const KIND: MemberKind = MemberKind::Reference;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        match &self.0 {
            Some(target) => ctx.reference_token(&ObjectHandle::from_shared(target.clone())),
            None => Value::Null,
        }
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        match ctx.resolve_reference(value) {
            Resolution::Null => {
                self.0 = None;
                true
            }
            Resolution::Resolved(_, target) => match self.link(&target) {
                Ok(()) => true,
                Err(err) => {
                    ctx.report(err.into());
                    false
                }
            },
            Resolution::Deferred(_) => true,
            Resolution::Invalid => false,
        }
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        let mut fresh = Self::default();
        fresh.load(value, ctx);
        Some(fresh)
    }

    fn link(&mut self, target: &ObjectHandle) -> Result<(), LinkError> {
        match target.downcast::<T>() {
            Some(handle) => {
                self.0 = Some(handle);
                Ok(())
            }
            None => Err(LinkError::Incompatible {
                expected: std::any::type_name::<T>(),
                found: target.type_name(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// PartRef
// ---------------------------------------------------------------------------

/// Reference to a part of a referenceable object.
///
/// Written as the UID of the owning object; on load the part of type `T` is
/// looked up on the resolved owner. An owner without that part yet keeps the
/// reference pending until [`IdentityRegistry::parts_changed`] runs for it,
/// which loading the owner does. Saving a part whose owner is not registered
/// reports an unsupported reference kind.
///
/// [`IdentityRegistry::parts_changed`]: crate::IdentityRegistry::parts_changed
pub struct PartRef<T: Persistable>(Option<Shared<T>>);

impl<T: Persistable> PartRef<T> {
    pub fn new(part: Shared<T>) -> Self {
        Self(Some(part))
    }

    pub fn get(&self) -> Option<&Shared<T>> {
        self.0.as_ref()
    }

    pub fn set(&mut self, part: Shared<T>) {
        self.0 = Some(part);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl<T: Persistable> Default for PartRef<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: Persistable> Clone for PartRef<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Persistable> fmt::Debug for PartRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(h) => write!(f, "PartRef({:#x})", address_of(h)),
            None => f.write_str("PartRef(None)"),
        }
    }
}

impl<T: Persistable> Persist for PartRef<T> {
    const KIND: MemberKind = MemberKind::Reference;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        match &self.0 {
            Some(part) => ctx.part_token(address_of(part), std::any::type_name::<T>()),
            None => Value::Null,
        }
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        match ctx.resolve_reference(value) {
            Resolution::Null => {
                self.0 = None;
                true
            }
            Resolution::Resolved(uid, owner) => match self.link(&owner) {
                Ok(()) => true,
                // The owner may still be loading; link once the part is attached.
                Err(LinkError::MissingPart { .. }) => ctx.defer(uid),
                Err(err) => {
                    ctx.report(err.into());
                    false
                }
            },
            Resolution::Deferred(_) => true,
            Resolution::Invalid => false,
        }
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        let mut fresh = Self::default();
        fresh.load(value, ctx);
        Some(fresh)
    }

    fn link(&mut self, target: &ObjectHandle) -> Result<(), LinkError> {
        match target.part::<T>() {
            Some(part) => {
                self.0 = Some(part);
                Ok(())
            }
            None => Err(LinkError::MissingPart {
                part: std::any::type_name::<T>(),
                owner: target.type_name(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// RefWrapper
// ---------------------------------------------------------------------------

/// Holder entity for one reference, for use inside collections.
///
/// Sequences and maps cannot hold raw references. Hold shared wrappers
/// instead, so each element is an entity that a deferred reference can be
/// patched into:
///
/// ```ignore
/// #[save]
/// targets: Vec<Shared<RefWrapper<Node>>>,
/// ```
#[derive(Persistable)]
pub struct RefWrapper<T: Referenceable> {
    #[save]
    target: Ref<T>,
}

impl<T: Referenceable> RefWrapper<T> {
    pub fn new(target: Shared<T>) -> Self {
        Self {
            target: Ref::new(target),
        }
    }

    pub fn target(&self) -> &Ref<T> {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut Ref<T> {
        &mut self.target
    }
}

impl<T: Referenceable> Default for RefWrapper<T> {
    fn default() -> Self {
        Self {
            target: Ref::default(),
        }
    }
}

impl<T: Referenceable> fmt::Debug for RefWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefWrapper")
            .field("target", &self.target)
            .finish()
    }
}
