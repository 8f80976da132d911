use crate::handle::{Shared, WeakEntityHandle};
use crate::identity::Uid;
use crate::reflect::{Persistable, PersistableType};

/// The entity that owns a reference member being loaded.
#[derive(Clone, Debug)]
pub enum Holder {
    /// A shared entity; it can be patched after the load pass returns.
    Shared {
        entity: WeakEntityHandle,
        type_tag: &'static str,
    },
    /// A by-value entity, copied into its parent. A deferred patch would land
    /// on a copy, so references inside it are never deferred.
    Value { type_tag: &'static str },
}

impl Holder {
    pub fn of_shared<T: PersistableType>(handle: &Shared<T>) -> Self {
        Holder::Shared {
            entity: WeakEntityHandle::from_shared(handle),
            type_tag: T::tag(),
        }
    }

    pub fn of_value(entity: &dyn Persistable) -> Self {
        Holder::Value {
            type_tag: entity.type_tag(),
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Holder::Shared { type_tag, .. } | Holder::Value { type_tag } => type_tag,
        }
    }
}

/// A reference waiting for its target UID to be registered.
#[derive(Clone, Debug)]
pub struct PendingReference {
    pub(crate) holder: WeakEntityHandle,
    pub(crate) holder_tag: &'static str,
    pub(crate) member: String,
    pub(crate) target: Uid,
}

impl PendingReference {
    pub fn holder_tag(&self) -> &'static str {
        self.holder_tag
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn target(&self) -> Uid {
        self.target
    }

    pub fn is_alive(&self) -> bool {
        self.holder.is_alive()
    }
}
