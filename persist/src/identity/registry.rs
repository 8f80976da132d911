use std::collections::HashMap;

use crate::error::LinkError;
use crate::handle::ObjectHandle;
use crate::identity::pending::{Holder, PendingReference};
use crate::identity::source::{RandomUidSource, UidSource};
use crate::identity::Uid;

/// Maps durable UIDs to live referenceable objects.
///
/// Also owns the pending-reference table: references read before their
/// target was registered. Registering or refreshing a UID resolves every
/// pending reference waiting on it before the call returns.
///
/// Parts of registered objects are indexed by address so part references
/// find their owner without scanning. Call [`parts_changed`] after
/// attaching parts to a registered object.
///
/// [`parts_changed`]: IdentityRegistry::parts_changed
pub struct IdentityRegistry {
    objects: HashMap<Uid, ObjectHandle>,
    addresses: HashMap<usize, Uid>,
    part_owners: HashMap<usize, Uid>,
    pending: HashMap<Uid, Vec<PendingReference>>,
    source: Box<dyn UidSource>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::with_source(RandomUidSource::from_entropy())
    }

    /// Registry drawing candidate UIDs from `source`.
    pub fn with_source(source: impl UidSource + 'static) -> Self {
        Self {
            objects: HashMap::new(),
            addresses: HashMap::new(),
            part_owners: HashMap::new(),
            pending: HashMap::new(),
            source: Box::new(source),
        }
    }

    /// Register `object` under a fresh UID.
    ///
    /// Candidates are drawn until one is non-zero and unused. If the object
    /// was already registered, its previous UID is released.
    pub fn generate_uid(&mut self, object: &ObjectHandle) -> Uid {
        let uid = loop {
            let candidate = Uid::new(self.source.next_uid());
            if candidate.is_unset() || self.objects.contains_key(&candidate) {
                log::debug!("UID candidate {candidate} is taken, drawing again");
                continue;
            }
            break candidate;
        };
        self.insert(uid, object.clone());
        self.resolve_pending(uid);
        uid
    }

    /// UID of `object`, generating one if it has none yet.
    pub fn identity_of(&mut self, object: &ObjectHandle) -> Uid {
        match self.uid_of(object) {
            Some(uid) => uid,
            None => self.generate_uid(object),
        }
    }

    pub fn uid_of(&self, object: &ObjectHandle) -> Option<Uid> {
        self.addresses.get(&object.address()).copied()
    }

    /// UID of the object with `part_address` among its parts.
    ///
    /// Parts attached behind the registry's back are found by a full scan
    /// once and indexed from then on.
    pub fn owner_of_part(&mut self, part_address: usize) -> Option<Uid> {
        if let Some(&uid) = self.part_owners.get(&part_address)
            && self.holds_part(uid, part_address)
        {
            return Some(uid);
        }
        let uid = self.objects.iter().find_map(|(uid, object)| {
            object
                .parts()
                .iter()
                .any(|part| part.address() == part_address)
                .then_some(*uid)
        })?;
        log::trace!("part {part_address:#x} found on {uid} by scan");
        self.index_parts(uid);
        Some(uid)
    }

    /// Re-index the parts of the object under `uid` and retry references
    /// waiting on it. Part references to a part that was missing when they
    /// were read link here. Returns how many were resolved.
    pub fn parts_changed(&mut self, uid: Uid) -> usize {
        self.index_parts(uid);
        self.resolve_pending(uid)
    }

    pub fn get(&self, uid: Uid) -> Option<ObjectHandle> {
        self.objects.get(&uid).cloned()
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.objects.contains_key(&uid)
    }

    /// Remove the mapping for `uid`. Pending references waiting on it stay.
    pub fn remove(&mut self, uid: Uid) -> Option<ObjectHandle> {
        let object = self.objects.remove(&uid)?;
        if self.addresses.get(&object.address()) == Some(&uid) {
            self.addresses.remove(&object.address());
        }
        self.part_owners.retain(|_, owner| *owner != uid);
        Some(object)
    }

    /// Associate `uid` with `object`, replacing whatever held it before, then
    /// resolve pending references to it. Returns how many were resolved.
    pub fn refresh(&mut self, object: &ObjectHandle, uid: Uid) -> usize {
        if uid.is_unset() {
            log::warn!("refusing to refresh {object:?} with the unset UID");
            return 0;
        }
        self.insert(uid, object.clone());
        self.resolve_pending(uid)
    }

    /// Record that `holder`'s `member` should receive the object for `uid`
    /// once it is registered. By-value holders are refused with a warning.
    pub fn register_pending(&mut self, holder: &Holder, uid: Uid, member: &str) -> bool {
        match holder {
            Holder::Value { type_tag } => {
                log::warn!(
                    "reference {uid} in member '{member}' of by-value '{type_tag}' cannot be deferred, dropping it"
                );
                false
            }
            Holder::Shared { entity, type_tag } => {
                log::debug!("deferring reference {uid} for '{type_tag}.{member}'");
                self.pending.entry(uid).or_default().push(PendingReference {
                    holder: entity.clone(),
                    holder_tag: *type_tag,
                    member: member.to_owned(),
                    target: uid,
                });
                true
            }
        }
    }

    /// Total number of pending references.
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn pending_for(&self, uid: Uid) -> &[PendingReference] {
        self.pending.get(&uid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop every pending reference, e.g. when a session ends.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn uids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.objects.keys().copied()
    }

    fn insert(&mut self, uid: Uid, object: ObjectHandle) {
        let address = object.address();
        if let Some(previous) = self.addresses.insert(address, uid)
            && previous != uid
        {
            log::debug!("{object:?} moves from UID {previous} to {uid}");
            self.objects.remove(&previous);
        }
        if let Some(replaced) = self.objects.insert(uid, object)
            && replaced.address() != address
            && self.addresses.get(&replaced.address()) == Some(&uid)
        {
            self.addresses.remove(&replaced.address());
        }
        self.index_parts(uid);
    }

    fn index_parts(&mut self, uid: Uid) {
        let Some(object) = self.objects.get(&uid) else {
            return;
        };
        for part in object.parts() {
            self.part_owners.insert(part.address(), uid);
        }
    }

    fn holds_part(&self, uid: Uid, part_address: usize) -> bool {
        self.objects.get(&uid).is_some_and(|object| {
            object
                .parts()
                .iter()
                .any(|part| part.address() == part_address)
        })
    }

    fn resolve_pending(&mut self, uid: Uid) -> usize {
        let Some(entries) = self.pending.remove(&uid) else {
            return 0;
        };
        let Some(target) = self.objects.get(&uid).cloned() else {
            self.pending.insert(uid, entries);
            return 0;
        };

        let mut resolved = 0;
        let mut kept = Vec::new();
        for entry in entries {
            let Some(holder) = entry.holder.upgrade() else {
                log::debug!(
                    "holder '{}' of pending reference {uid} is gone, dropping it",
                    entry.holder_tag
                );
                continue;
            };
            let Some(mut guard) = holder.try_write() else {
                log::trace!("holder '{}' is busy, keeping reference {uid}", entry.holder_tag);
                kept.push(entry);
                continue;
            };
            match guard.link_member(&entry.member, &target) {
                Ok(()) => resolved += 1,
                Err(LinkError::MissingPart { part, .. }) => {
                    log::trace!("{uid} has no '{part}' part yet, keeping reference");
                    kept.push(entry);
                }
                Err(err) => log::warn!(
                    "pending reference {uid} for '{}.{}' dropped: {err}",
                    entry.holder_tag,
                    entry.member
                ),
            }
        }
        if !kept.is_empty() {
            self.pending.insert(uid, kept);
        }
        log::debug!("resolved {resolved} pending reference(s) to {uid}");
        resolved
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::handle::{EntityHandle, shared};
    use crate::member::RefWrapper;
    use crate::node::Node;

    fn object(name: &str) -> ObjectHandle {
        ObjectHandle::from_shared(shared(Node::new(name)))
    }

    fn scripted(values: Vec<u64>) -> impl FnMut() -> u64 + Send {
        let mut values = values.into_iter();
        move || values.next().unwrap_or(u64::MAX)
    }

    #[test]
    fn get_returns_registered_instance() {
        let mut registry = IdentityRegistry::new();
        let a = object("a");
        let uid = registry.generate_uid(&a);
        assert!(!uid.is_unset());
        assert!(registry.get(uid).unwrap().ptr_eq(&a));
        assert_eq!(registry.uid_of(&a), Some(uid));
    }

    #[test]
    fn collision_draws_again() {
        let draws = Arc::new(AtomicUsize::new(0));
        let counter = draws.clone();
        let mut values = vec![5u64, 5, 0, 9].into_iter();
        let mut registry = IdentityRegistry::with_source(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            values.next().unwrap_or(42)
        });

        assert_eq!(registry.generate_uid(&object("a")), Uid::new(5));
        assert_eq!(registry.generate_uid(&object("b")), Uid::new(9));
        assert_eq!(draws.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn identity_of_is_stable() {
        let mut registry = IdentityRegistry::with_source(scripted(vec![1, 2, 3]));
        let a = object("a");
        let first = registry.identity_of(&a);
        assert_eq!(registry.identity_of(&a), first);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_forgets_mapping() {
        let mut registry = IdentityRegistry::with_source(scripted(vec![11]));
        let a = object("a");
        let uid = registry.generate_uid(&a);
        assert!(registry.remove(uid).is_some());
        assert!(registry.get(uid).is_none());
        assert!(registry.uid_of(&a).is_none());
    }

    #[test]
    fn refresh_moves_uid_to_new_instance() {
        let mut registry = IdentityRegistry::with_source(scripted(vec![77]));
        let old = object("old");
        let uid = registry.generate_uid(&old);

        let new = object("new");
        registry.refresh(&new, uid);
        assert!(registry.get(uid).unwrap().ptr_eq(&new));
        assert!(registry.uid_of(&old).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn refresh_rejects_unset_uid() {
        let mut registry = IdentityRegistry::new();
        registry.refresh(&object("a"), Uid::UNSET);
        assert!(registry.is_empty());
    }

    #[test]
    fn by_value_holder_is_not_deferred() {
        let mut registry = IdentityRegistry::new();
        let holder = Holder::Value { type_tag: "Plain" };
        assert!(!registry.register_pending(&holder, Uid::new(3), "peer"));
        assert_eq!(registry.pending_count(), 0);
    }

    fn part() -> EntityHandle {
        EntityHandle::new(RefWrapper::<Node>::default())
    }

    #[test]
    fn part_owner_is_indexed_on_registration() {
        let mut registry = IdentityRegistry::with_source(scripted(vec![4]));
        let owner = object("owner");
        let wrapper = part();
        owner.attach(wrapper.clone());

        let uid = registry.generate_uid(&owner);
        assert_eq!(registry.part_owners.get(&wrapper.address()), Some(&uid));
        assert_eq!(registry.owner_of_part(wrapper.address()), Some(uid));
    }

    #[test]
    fn part_attached_after_registration_is_found_and_indexed() {
        let mut registry = IdentityRegistry::with_source(scripted(vec![6]));
        let owner = object("owner");
        let uid = registry.generate_uid(&owner);
        let wrapper = part();
        owner.attach(wrapper.clone());

        assert!(registry.part_owners.is_empty());
        assert_eq!(registry.owner_of_part(wrapper.address()), Some(uid));
        assert_eq!(registry.part_owners.get(&wrapper.address()), Some(&uid));
    }

    #[test]
    fn removing_owner_drops_its_part_entries() {
        let mut registry = IdentityRegistry::with_source(scripted(vec![8]));
        let owner = object("owner");
        let wrapper = part();
        owner.attach(wrapper.clone());
        let uid = registry.generate_uid(&owner);

        registry.remove(uid);
        assert!(registry.part_owners.is_empty());
        assert_eq!(registry.owner_of_part(wrapper.address()), None);
    }
}
