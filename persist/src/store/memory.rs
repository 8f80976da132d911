use std::collections::BTreeMap;

use crate::document::RootDocument;
use crate::error::{DeserializeError, StoreError};
use crate::format::{self, Format};
use crate::identity::Uid;
use crate::store::EntityStore;
use crate::value::Value;

/// In-memory entity store.
///
/// Also encodes and decodes the store blob, which [`FileStore`](super::FileStore)
/// reads and writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    documents: BTreeMap<Uid, RootDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }

    /// The store blob as a value tree.
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.documents
                .iter()
                .map(|(uid, document)| (uid.to_string(), document.clone().into_value()))
                .collect(),
        )
    }

    /// Parse a store blob. Keys must be decimal UIDs.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        let Value::Map(entries) = value else {
            return Err(StoreError::Deserialize(DeserializeError::MalformedDocument(
                format!("store must be an object, found {}", value.kind_name()),
            )));
        };
        let mut documents = BTreeMap::new();
        for (key, value) in entries {
            let uid: Uid = key.parse().map_err(|_| StoreError::InvalidUid(key.clone()))?;
            if uid.is_unset() {
                return Err(StoreError::InvalidUid(key));
            }
            documents.insert(uid, RootDocument::from_value(value)?);
        }
        Ok(Self { documents })
    }

    pub fn to_bytes(&self, format: Format) -> Result<Vec<u8>, StoreError> {
        Ok(format::encode(&self.to_value(), format)?)
    }

    pub fn from_bytes(bytes: &[u8], format: Format) -> Result<Self, StoreError> {
        let value: Value = format::decode(bytes, format)?;
        Self::from_value(value)
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, uid: Uid) -> Option<RootDocument> {
        self.documents.get(&uid).cloned()
    }

    fn put(&mut self, uid: Uid, document: RootDocument) {
        self.documents.insert(uid, document);
    }

    fn remove(&mut self, uid: Uid) -> Option<RootDocument> {
        self.documents.remove(&uid)
    }

    fn uids(&self) -> Vec<Uid> {
        self.documents.keys().copied().collect()
    }
}
