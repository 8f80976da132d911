//! Host-facing facade.
//!
//! [`Persistence`] owns everything a session needs: the type registry, the
//! identity registry, an entity store and the set of tracked root objects.
//! The host drives it through three hooks:
//!
//! - [`on_identity_needed`](Persistence::on_identity_needed) when an object
//!   needs a UID
//! - [`on_save_requested`](Persistence::on_save_requested) to save every
//!   root that saves automatically and flush the store
//! - [`on_load_requested`](Persistence::on_load_requested) to re-read the
//!   store and load every root that loads automatically
//!
//! Roots may be loaded in any order; references to roots not loaded yet are
//! patched in as soon as their UID is registered.

use std::collections::BTreeMap;

use crate::config::PersistConfig;
use crate::deserializer::GraphDeserializer;
use crate::diagnostic::Diagnostic;
use crate::error::StoreError;
use crate::handle::ObjectHandle;
use crate::identity::{IdentityRegistry, Uid};
use crate::reflect::{PersistableType, TypeRegistry};
use crate::serializer::GraphSerializer;
use crate::store::{EntityStore, FileStore};

/// Per-root behavior on save and load requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOptions {
    pub load_automatically: bool,
    pub save_automatically: bool,
}

impl TrackOptions {
    /// Holds a UID so it can be referenced, but never writes or reads data.
    pub const IDENTITY_ONLY: TrackOptions = TrackOptions {
        load_automatically: false,
        save_automatically: false,
    };
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            load_automatically: true,
            save_automatically: true,
        }
    }
}

struct Tracked {
    object: ObjectHandle,
    options: TrackOptions,
}

/// Summary of a save or load request.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    /// Roots saved or loaded.
    pub objects: usize,
    /// References still waiting for their target afterwards.
    pub pending: usize,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn absorb(&mut self, other: Report) {
        self.diagnostics.extend(other.diagnostics);
        self.objects += other.objects;
    }
}

/// Session-wide persistence state.
pub struct Persistence<S: EntityStore = FileStore> {
    types: TypeRegistry,
    registry: IdentityRegistry,
    store: S,
    config: PersistConfig,
    tracked: BTreeMap<Uid, Tracked>,
}

impl Persistence<FileStore> {
    /// Session backed by the file store the config names.
    pub fn from_config(config: PersistConfig) -> Self {
        let store = config.file_store();
        Self::with_store(store, config)
    }
}

impl<S: EntityStore> Persistence<S> {
    pub fn with_store(store: S, config: PersistConfig) -> Self {
        Self {
            types: TypeRegistry::new(),
            registry: IdentityRegistry::new(),
            store,
            config,
            tracked: BTreeMap::new(),
        }
    }

    /// Replace the identity registry, e.g. to inject a UID source.
    pub fn with_registry(mut self, registry: IdentityRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register a type for construction by tag.
    pub fn register<T: PersistableType>(&mut self) -> &mut Self {
        self.types.register::<T>();
        self
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IdentityRegistry {
        &mut self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// UID of `object`, generating one if needed.
    pub fn on_identity_needed(&mut self, object: &ObjectHandle) -> Uid {
        self.registry.identity_of(object)
    }

    /// Track a root with the configured default options. See
    /// [`track_with`](Self::track_with).
    pub fn track(&mut self, object: ObjectHandle, uid: Uid) -> Uid {
        let options = TrackOptions {
            load_automatically: self.config.load_automatically,
            save_automatically: self.config.save_automatically,
        };
        self.track_with(object, uid, options)
    }

    /// Track a root object.
    ///
    /// An object with a previous UID reclaims it, resolving every reference
    /// waiting on it; an object with the unset UID gets a fresh one. If the
    /// store has been read and the root loads automatically, it is loaded
    /// right away.
    pub fn track_with(&mut self, object: ObjectHandle, uid: Uid, options: TrackOptions) -> Uid {
        let uid = if uid.is_unset() {
            self.registry.generate_uid(&object)
        } else {
            let resolved = self.registry.refresh(&object, uid);
            if resolved > 0 {
                log::debug!("{uid} resolved {resolved} pending references");
            }
            uid
        };
        let replaced = self.tracked.insert(
            uid,
            Tracked {
                object: object.clone(),
                options,
            },
        );
        if let Some(previous) = replaced
            && !previous.object.ptr_eq(&object)
        {
            log::debug!("{uid} now tracks a new instance of {}", previous.object.type_name());
        }

        if options.load_automatically && self.store.is_loaded() {
            self.load_object(uid);
        }
        uid
    }

    /// Stop tracking a root. Its identity stays registered.
    pub fn untrack(&mut self, uid: Uid) -> Option<ObjectHandle> {
        self.tracked.remove(&uid).map(|t| t.object)
    }

    /// Stop tracking a root and release its identity.
    pub fn forget(&mut self, uid: Uid) -> Option<ObjectHandle> {
        let tracked = self.untrack(uid);
        let registered = self.registry.remove(uid);
        tracked.or(registered)
    }

    pub fn is_tracked(&self, uid: Uid) -> bool {
        self.tracked.contains_key(&uid)
    }

    pub fn tracked(&self) -> impl Iterator<Item = Uid> + '_ {
        self.tracked.keys().copied()
    }

    /// Save one tracked root into the store.
    pub fn save_object(&mut self, uid: Uid) -> Report {
        let Some(tracked) = self.tracked.get(&uid) else {
            log::warn!("cannot save {uid}: not tracked");
            return Report::default();
        };
        let serializer = GraphSerializer::new(&self.types).with_max_depth(self.config.max_depth);
        let (root, diagnostics) = serializer
            .serialize_object(&mut self.registry, &tracked.object)
            .into_parts();
        self.store.put(uid, root);
        Report {
            diagnostics,
            objects: 1,
            pending: self.registry.pending_count(),
        }
    }

    /// Load one tracked root from the store. A root with no stored document
    /// keeps its current state.
    pub fn load_object(&mut self, uid: Uid) -> Report {
        let Some(tracked) = self.tracked.get(&uid) else {
            log::warn!("cannot load {uid}: not tracked");
            return Report::default();
        };
        let Some(root) = self.store.get(uid) else {
            log::debug!("nothing stored for {uid}");
            return Report {
                pending: self.registry.pending_count(),
                ..Report::default()
            };
        };
        let object = tracked.object.clone();
        let deserializer =
            GraphDeserializer::new(&self.types).with_max_depth(self.config.max_depth);
        let (_, diagnostics) = deserializer
            .load_object(&mut self.registry, &object, root)
            .into_parts();
        Report {
            diagnostics,
            objects: 1,
            pending: self.registry.pending_count(),
        }
    }

    /// Save every root that saves automatically, then flush the store.
    pub fn on_save_requested(&mut self) -> Result<Report, StoreError> {
        let uids: Vec<Uid> = self
            .tracked
            .iter()
            .filter(|(_, t)| t.options.save_automatically)
            .map(|(uid, _)| *uid)
            .collect();
        let mut report = Report::default();
        for uid in uids {
            report.absorb(self.save_object(uid));
        }
        self.store.flush()?;
        report.pending = self.registry.pending_count();
        log::info!(
            "saved {} objects ({} diagnostics)",
            report.objects,
            report.diagnostics.len()
        );
        Ok(report)
    }

    /// Re-read the store, then load every root that loads automatically.
    pub fn on_load_requested(&mut self) -> Result<Report, StoreError> {
        self.store.reload()?;
        let uids: Vec<Uid> = self
            .tracked
            .iter()
            .filter(|(_, t)| t.options.load_automatically)
            .map(|(uid, _)| *uid)
            .collect();
        let mut report = Report::default();
        for uid in uids {
            report.absorb(self.load_object(uid));
        }
        report.pending = self.registry.pending_count();
        log::info!(
            "loaded {} objects ({} diagnostics, {} references pending)",
            report.objects,
            report.diagnostics.len(),
            report.pending
        );
        Ok(report)
    }
}
