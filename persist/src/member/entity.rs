//! Embedded entity codecs.

use super::Persist;
use crate::deserializer::LoadContext;
use crate::handle::{EntityHandle, Shared};
use crate::reflect::{MemberKind, PersistableType};
use crate::serializer::SaveContext;
use crate::value::Value;

/// A statically typed shared entity. The slot only ever holds a `T`, so a
/// document of any other type is a mismatch and leaves the slot untouched.
impl<T: PersistableType> Persist for Shared<T> {
    const KIND: MemberKind = MemberKind::Embedded;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        ctx.save_shared(self)
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        ctx.load_shared(value, self)
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        ctx.load_shared_new(value)
    }
}

/// A type-erased entity. Saved with its runtime type; loading replaces it
/// when the document names a different type.
impl Persist for EntityHandle {
    const KIND: MemberKind = MemberKind::Embedded;
    const DYNAMIC: bool = true;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        ctx.save_handle(self)
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        ctx.load_handle(value, self)
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        ctx.load_handle_new(value)
    }
}
