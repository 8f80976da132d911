use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::reflect::{Persistable, PersistableType, Schema};

/// Cache of schemas keyed by runtime type.
///
/// A schema is built the first time its type is seen and shared afterwards,
/// so member discovery costs one call per type rather than one per visit.
#[derive(Default)]
pub struct ReflectionIndex {
    schemas: RwLock<HashMap<TypeId, Arc<Schema>>>,
}

impl ReflectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema of the entity's runtime type.
    pub fn schema_of(&self, entity: &dyn Persistable) -> Arc<Schema> {
        let type_id = entity.as_any().type_id();
        self.get_or_build(type_id, entity.schema_builder())
    }

    pub fn schema<T: PersistableType>(&self) -> Arc<Schema> {
        self.get_or_build(TypeId::of::<T>(), T::build_schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    fn get_or_build(&self, type_id: TypeId, build: fn() -> Schema) -> Arc<Schema> {
        if let Some(schema) = self.schemas.read().get(&type_id) {
            return schema.clone();
        }
        let schema = build();
        for problem in schema.lint() {
            log::warn!("{problem}");
        }
        self.schemas
            .write()
            .entry(type_id)
            .or_insert_with(|| Arc::new(schema))
            .clone()
    }
}
