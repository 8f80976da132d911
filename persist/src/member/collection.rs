//! Sequence and map codecs.
//!
//! Sequences are written as lists. Maps and key/value pairs are written as
//! lists of `{"Key":…,"Value":…}` entries so that non-string keys survive
//! any text format. Null loads as an empty collection.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

use indexmap::IndexMap;

use super::Persist;
use crate::deserializer::LoadContext;
use crate::error::{DeserializeError, LinkError};
use crate::handle::ObjectHandle;
use crate::reflect::MemberKind;
use crate::serializer::SaveContext;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

impl<T: Persist> Persist for Vec<T> {
    const KIND: MemberKind = MemberKind::Sequence;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        ctx.save_sequence(self)
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        ctx.load_sequence_into(value, self)
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        ctx.load_sequence(value)
    }
}

impl<T: Persist> Persist for VecDeque<T> {
    const KIND: MemberKind = MemberKind::Sequence;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        ctx.save_sequence(self)
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        let mut items = Vec::from(std::mem::take(self));
        let applied = ctx.load_sequence_into(value, &mut items);
        *self = items.into();
        applied
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        ctx.load_sequence::<T>(value).map(VecDeque::from)
    }
}

impl<T: Persist, const N: usize> Persist for [T; N] {
    const KIND: MemberKind = MemberKind::Sequence;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        ctx.save_sequence(self)
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        match Self::load_new(value, ctx) {
            Some(loaded) => {
                *self = loaded;
                true
            }
            None => false,
        }
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        let items = ctx.load_sequence::<T>(value)?;
        let len = items.len();
        match <[T; N]>::try_from(items) {
            Ok(array) => Some(array),
            Err(_) => {
                ctx.report(DeserializeError::TypeMismatch {
                    expected: format!("list of {N} elements"),
                    found: format!("list of {len} elements"),
                });
                None
            }
        }
    }
}

impl<T: Persist + Eq + Hash> Persist for HashSet<T> {
    const KIND: MemberKind = MemberKind::Sequence;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        ctx.save_sequence(self)
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        match Self::load_new(value, ctx) {
            Some(loaded) => {
                *self = loaded;
                true
            }
            None => false,
        }
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        ctx.load_sequence::<T>(value)
            .map(|items| items.into_iter().collect())
    }
}

impl<T: Persist + Ord> Persist for BTreeSet<T> {
    const KIND: MemberKind = MemberKind::Sequence;

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        ctx.save_sequence(self)
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        match Self::load_new(value, ctx) {
            Some(loaded) => {
                *self = loaded;
                true
            }
            None => false,
        }
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        ctx.load_sequence::<T>(value)
            .map(|items| items.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

macro_rules! impl_map {
    ($map:ident, $($bound:path),+) => {
        impl<K: Persist $(+ $bound)+, V: Persist> Persist for $map<K, V> {
            const KIND: MemberKind = MemberKind::Map;

            fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
                ctx.save_map(self.iter())
            }

            fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
                match Self::load_new(value, ctx) {
                    Some(loaded) => {
                        *self = loaded;
                        true
                    }
                    None => false,
                }
            }

            fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
                ctx.load_entries::<K, V>(value)
                    .map(|entries| entries.into_iter().collect())
            }
        }
    };
}

impl_map!(HashMap, Eq, Hash);
impl_map!(BTreeMap, Ord);
impl_map!(IndexMap, Eq, Hash);

/// A single key/value pair, written as one `{"Key":…,"Value":…}` entry.
impl<K: Persist, V: Persist> Persist for (K, V) {
    const KIND: MemberKind = if K::KIND.is_reference() || V::KIND.is_reference() {
        MemberKind::Reference
    } else {
        MemberKind::Map
    };

    fn save(&self, ctx: &mut SaveContext<'_>) -> Value {
        ctx.save_entry(&self.0, &self.1)
    }

    fn load(&mut self, value: Value, ctx: &mut LoadContext<'_>) -> bool {
        match ctx.load_entry(value) {
            Some(entry) => {
                *self = entry;
                true
            }
            None => false,
        }
    }

    fn load_new(value: Value, ctx: &mut LoadContext<'_>) -> Option<Self> {
        ctx.load_entry(value)
    }

    fn link(&mut self, target: &ObjectHandle) -> Result<(), LinkError> {
        match self.1.link(target) {
            Err(LinkError::NotAReference) => self.0.link(target),
            linked => linked,
        }
    }
}
