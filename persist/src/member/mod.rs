//! Member codecs.
//!
//! Every persisted member is encoded through its [`Persist`] impl. Which
//! impl applies is decided statically from the member's declared type, and
//! its [`MemberKind`] is recorded in the schema when the schema is built.
//!
//! - scalars and strings go through serde
//! - [`Shared`](crate::Shared) entities and [`EntityHandle`](crate::EntityHandle)s
//!   embed a tagged document
//! - [`Ref`] and [`PartRef`] write UID tokens
//! - sequences and maps recurse element by element

mod collection;
mod entity;
mod reference;

pub use reference::{PartRef, Ref, RefWrapper};

use crate::deserializer::LoadContext;
use crate::error::LinkError;
use crate::handle::ObjectHandle;
use crate::reflect::MemberKind;
use crate::serializer::SaveContext;
use crate::value::Value;

/// Encoding of one member type.
pub trait Persist: Sized + Send + Sync + 'static {
    /// Encoding category, fixed for the type.
    const KIND: MemberKind;

    /// Whether the concrete type is only known at runtime.
    const DYNAMIC: bool = false;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value;

    /// Load into an existing value, reusing it where possible. Returns
    /// `false` if nothing was applied and the value still holds stale state.
    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool;

    /// Build a fresh value. `None` means the value could not be decoded and
    /// the failure was reported.
    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self>;

    /// Assign a live referenceable target. Only reference members accept.
    fn link(&mut self, target: &ObjectHandle) -> Result<(), LinkError> {
        let _ = target;
        Err(LinkError::NotAReference)
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Persist for $ty {
                const KIND: MemberKind = MemberKind::Scalar;

                fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
                    ctx.save_scalar(self)
                }

                fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
                    match ctx.load_scalar(value) {
                        Some(decoded) => {
                            *self = decoded;
                            true
                        }
                        None => false,
                    }
                }

                fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
                    ctx.load_scalar(value)
                }
            }
        )*
    };
}

impl_scalar!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char, String,
);

impl Persist for Value {
    const KIND: MemberKind = MemberKind::Scalar;

    fn save(&self, _ctx: &mut SaveContext<'_>) -> Value {
        self.clone()
    }

    fn load(&mut self, value: Value, _ctx: &mut LoadContext<'_>) -> bool {
        *self = value;
        true
    }

    fn load_new(value: Value, _ctx: &mut LoadContext<'_>) -> Option<Self> {
        Some(value)
    }
}

// ---------------------------------------------------------------------------
// Option
// ---------------------------------------------------------------------------

impl<T: Persist> Persist for Option<T> {
    const KIND: MemberKind = T::KIND;
    const DYNAMIC: bool = T::DYNAMIC;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        match self {
            Some(inner) => inner.save(ctx),
            None => Value::Null,
        }
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        if value.is_null() {
            *self = None;
            return true;
        }
        match self {
            Some(inner) => inner.load(value, ctx),
            None => {
                *self = T::load_new(value, ctx);
                self.is_some()
            }
        }
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }
        T::load_new(value, ctx).map(Some)
    }

    fn link(&mut self, target: &ObjectHandle) -> Result<(), LinkError> {
        match self {
            Some(inner) => inner.link(target),
            None => Err(LinkError::NotAReference),
        }
    }
}
