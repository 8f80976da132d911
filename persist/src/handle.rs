//! Shared handles to live instances.
//!
//! Every instance that takes part in reference identity lives behind a
//! [`Shared`] handle. The address of the allocation is its identity: two
//! handles denote the same instance exactly when they point at the same
//! allocation, no matter how the instances compare by value.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::node::Referenceable;
use crate::reflect::{Persistable, PersistableType};

/// A shared, lockable instance.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a value in a fresh [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Identity key of the allocation behind a handle.
pub fn address_of<T: ?Sized>(handle: &Arc<T>) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}

// ---------------------------------------------------------------------------
// EntityHandle
// ---------------------------------------------------------------------------

/// Type-erased handle to a shared persistable entity.
///
/// Used for polymorphic members and for the parts of a referenceable object.
/// The concrete type behind a handle never changes, so its tag and type id
/// are captured once and read without locking.
#[derive(Clone)]
pub struct EntityHandle {
    any: Arc<dyn Any + Send + Sync>,
    entity: Arc<RwLock<dyn Persistable>>,
    type_tag: &'static str,
    type_id: TypeId,
}

impl EntityHandle {
    pub fn new<T: PersistableType>(value: T) -> Self {
        Self::from_shared(shared(value))
    }

    pub fn from_shared<T: Persistable>(handle: Shared<T>) -> Self {
        let type_tag = handle.read().type_tag();
        Self {
            any: handle.clone(),
            entity: handle,
            type_tag,
            type_id: TypeId::of::<T>(),
        }
    }

    /// Recover the typed handle, if the entity is a `T`.
    pub fn downcast<T: Persistable>(&self) -> Option<Shared<T>> {
        self.any.clone().downcast::<RwLock<T>>().ok()
    }

    pub fn is<T: Persistable>(&self) -> bool {
        self.any.is::<RwLock<T>>()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, dyn Persistable> {
        self.entity.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, dyn Persistable> {
        self.entity.write()
    }

    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, dyn Persistable>> {
        self.entity.try_write()
    }

    /// Runtime type tag of the entity.
    pub fn type_tag(&self) -> &'static str {
        self.type_tag
    }

    /// [`TypeId`] of the concrete entity type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn address(&self) -> usize {
        address_of(&self.entity)
    }

    pub fn ptr_eq(&self, other: &EntityHandle) -> bool {
        self.address() == other.address()
    }

    pub fn downgrade(&self) -> WeakEntityHandle {
        WeakEntityHandle(Arc::downgrade(&self.entity))
    }
}

impl<T: Persistable> From<Shared<T>> for EntityHandle {
    fn from(handle: Shared<T>) -> Self {
        Self::from_shared(handle)
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandle")
            .field("type_tag", &self.type_tag)
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

/// Non-owning counterpart of [`EntityHandle`].
#[derive(Clone)]
pub struct WeakEntityHandle(Weak<RwLock<dyn Persistable>>);

impl WeakEntityHandle {
    pub fn from_shared<T: Persistable>(handle: &Shared<T>) -> Self {
        let erased: Arc<RwLock<dyn Persistable>> = handle.clone();
        Self(Arc::downgrade(&erased))
    }

    pub fn upgrade(&self) -> Option<Arc<RwLock<dyn Persistable>>> {
        self.0.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakEntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakEntityHandle")
            .field(&self.is_alive())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ObjectHandle
// ---------------------------------------------------------------------------

/// Type-erased handle to a shared referenceable object.
///
/// This is what the identity registry maps UIDs to.
#[derive(Clone)]
pub struct ObjectHandle {
    any: Arc<dyn Any + Send + Sync>,
    object: Arc<RwLock<dyn Referenceable>>,
    type_name: &'static str,
}

impl ObjectHandle {
    pub fn new<T: Referenceable>(value: T) -> Self {
        Self::from_shared(shared(value))
    }

    pub fn from_shared<T: Referenceable>(handle: Shared<T>) -> Self {
        Self {
            any: handle.clone(),
            object: handle,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Recover the typed handle, if the object is a `T`.
    pub fn downcast<T: Referenceable>(&self) -> Option<Shared<T>> {
        self.any.clone().downcast::<RwLock<T>>().ok()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn read(&self) -> RwLockReadGuard<'_, dyn Referenceable> {
        self.object.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, dyn Referenceable> {
        self.object.write()
    }

    /// Snapshot of the object's parts.
    pub fn parts(&self) -> Vec<EntityHandle> {
        self.object.read().parts()
    }

    /// First part of type `T`.
    pub fn part<T: Persistable>(&self) -> Option<Shared<T>> {
        self.parts().iter().find_map(EntityHandle::downcast::<T>)
    }

    /// Part whose runtime type tag is `tag`.
    pub fn find_part(&self, tag: &str) -> Option<EntityHandle> {
        self.parts().into_iter().find(|p| p.type_tag() == tag)
    }

    /// Attach a new part; returns `false` if the object refused it.
    pub fn attach(&self, part: EntityHandle) -> bool {
        self.object.write().attach(part)
    }

    pub fn address(&self) -> usize {
        address_of(&self.object)
    }

    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        self.address() == other.address()
    }
}

impl<T: Referenceable> From<Shared<T>> for ObjectHandle {
    fn from(handle: Shared<T>) -> Self {
        Self::from_shared(handle)
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("type_name", &self.type_name)
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}
