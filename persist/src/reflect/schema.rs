use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::deserializer::LoadContext;
use crate::member::Persist;
use crate::serializer::SaveContext;
use crate::value::Value;

/// Reads a member out of its owner and encodes it.
pub type SaveFn = fn(&dyn Any, &mut SaveContext<'_>) -> Value;
/// Decodes a value into a member of its owner.
pub type LoadFn = fn(&mut dyn Any, Value, &mut LoadContext<'_>);

/// How a member is encoded. Fixed per member when the schema is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Plain data through the scalar codec.
    Scalar,
    /// A nested entity document.
    Embedded,
    /// A UID token pointing at a referenceable object.
    Reference,
    /// Array, list or set.
    Sequence,
    /// Map or key/value list, as `[{"Key":…,"Value":…}]`.
    Map,
}

impl MemberKind {
    pub const fn is_reference(self) -> bool {
        matches!(self, MemberKind::Reference)
    }
}

/// Per-member marker flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MemberFlags(u8);

impl MemberFlags {
    pub const NONE: MemberFlags = MemberFlags(0);
    /// Save with the runtime type rather than the declared type.
    pub const POLYMORPHIC: MemberFlags = MemberFlags(1 << 0);

    pub const fn contains(self, other: MemberFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: MemberFlags) -> MemberFlags {
        MemberFlags(self.0 | other.0)
    }
}

impl fmt::Debug for MemberFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(MemberFlags::POLYMORPHIC) {
            f.write_str("MemberFlags(POLYMORPHIC)")
        } else {
            f.write_str("MemberFlags(NONE)")
        }
    }
}

/// Schema entry for one persisted member.
#[derive(Clone)]
pub struct MemberInfo {
    name: &'static str,
    type_name: &'static str,
    kind: MemberKind,
    dynamic: bool,
    flags: MemberFlags,
    save: SaveFn,
    load: LoadFn,
}

impl MemberInfo {
    /// Member encoded through its [`Persist`] impl.
    pub fn new<T: Persist>(name: &'static str, flags: MemberFlags, save: SaveFn, load: LoadFn) -> Self {
        Self {
            name,
            type_name: std::any::type_name::<T>(),
            kind: T::KIND,
            dynamic: T::DYNAMIC,
            flags,
            save,
            load,
        }
    }

    /// Member routed through serde as an opaque scalar.
    pub fn scalar<T>(name: &'static str, flags: MemberFlags, save: SaveFn, load: LoadFn) -> Self {
        Self {
            name,
            type_name: std::any::type_name::<T>(),
            kind: MemberKind::Scalar,
            dynamic: false,
            flags,
            save,
            load,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared Rust type of the member.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn flags(&self) -> MemberFlags {
        self.flags
    }

    /// Whether the declared type is erased, so only the runtime type is known.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_polymorphic(&self) -> bool {
        self.flags.contains(MemberFlags::POLYMORPHIC)
    }

    pub(crate) fn save(&self, owner: &dyn Any, ctx: &mut SaveContext<'_>) -> Value {
        (self.save)(owner, ctx)
    }

    pub(crate) fn load(&self, owner: &mut dyn Any, value: Value, ctx: &mut LoadContext<'_>) {
        (self.load)(owner, value, ctx)
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Ordered table of the persisted members of one type.
#[derive(Debug, Clone)]
pub struct Schema {
    tag: &'static str,
    type_name: &'static str,
    members: Vec<MemberInfo>,
    by_name: HashMap<&'static str, usize>,
}

impl Schema {
    pub fn new(tag: &'static str, type_name: &'static str, members: Vec<MemberInfo>) -> Self {
        let by_name = members
            .iter()
            .enumerate()
            .map(|(index, member)| (member.name, index))
            .collect();
        Self {
            tag,
            type_name,
            members,
            by_name,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.by_name.get(name).map(|&index| &self.members[index])
    }

    /// Problems worth reporting once per type.
    pub fn lint(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for member in &self.members {
            if member.dynamic && !member.is_polymorphic() {
                problems.push(format!(
                    "'{}.{}' holds a type-erased entity and is always saved with its runtime type; mark it #[save(polymorphic)]",
                    self.tag, member.name
                ));
            }
        }
        if self.by_name.len() != self.members.len() {
            problems.push(format!("'{}' persists two members under one name", self.tag));
        }
        problems
    }
}
