//! Entity documents and the per-object root container.
//!
//! An entity document is an object with a reserved `"class"` key naming the
//! type, followed by one key per persisted member. A [`RootDocument`] maps
//! type tags to entity documents, one per part of a referenceable object.

use serde::{Deserialize, Serialize};

use crate::error::DeserializeError;
use crate::value::Value;

/// Reserved key holding the type tag of an entity document.
pub const CLASS_KEY: &str = "class";
/// Key of the key half of a map entry.
pub const KEY_KEY: &str = "Key";
/// Key of the value half of a map entry.
pub const VALUE_KEY: &str = "Value";

/// A tagged entity document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    class: String,
    members: Vec<(String, Value)>,
}

impl Document {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            members: Vec::new(),
        }
    }

    /// The type tag.
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn members(&self) -> &[(String, Value)] {
        &self.members
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, value)| value)
    }

    pub fn push(&mut self, member: impl Into<String>, value: Value) {
        self.members.push((member.into(), value));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, member: impl Into<String>, value: Value) -> Self {
        self.push(member, value);
        self
    }

    pub fn into_parts(self) -> (String, Vec<(String, Value)>) {
        (self.class, self.members)
    }

    pub fn into_value(self) -> Value {
        let mut entries = Vec::with_capacity(self.members.len() + 1);
        entries.push((CLASS_KEY.to_owned(), Value::String(self.class)));
        entries.extend(self.members);
        Value::Map(entries)
    }

    /// Parse an entity document out of a value tree.
    pub fn from_value(value: Value) -> Result<Self, DeserializeError> {
        let Value::Map(entries) = value else {
            return Err(DeserializeError::MalformedDocument(format!(
                "expected an object, found {}",
                value.kind_name()
            )));
        };
        let mut class = None;
        let mut members = Vec::with_capacity(entries.len().saturating_sub(1));
        for (key, value) in entries {
            if key == CLASS_KEY {
                match value {
                    Value::String(tag) => class = Some(tag),
                    other => {
                        return Err(DeserializeError::MalformedDocument(format!(
                            "'{CLASS_KEY}' must be a string, found {}",
                            other.kind_name()
                        )));
                    }
                }
            } else {
                members.push((key, value));
            }
        }
        let class = class.ok_or_else(|| {
            DeserializeError::MalformedDocument(format!("missing '{CLASS_KEY}' key"))
        })?;
        Ok(Self { class, members })
    }
}

impl Serialize for Document {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clone().into_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Document::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Container of entity documents keyed by type tag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RootDocument {
    parts: Vec<Document>,
}

impl RootDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a part document, replacing any previous one with the same tag.
    pub fn insert(&mut self, document: Document) {
        match self.parts.iter_mut().find(|d| d.class == document.class) {
            Some(slot) => *slot = document,
            None => self.parts.push(document),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&Document> {
        self.parts.iter().find(|d| d.class == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Map(
            self.parts
                .into_iter()
                .map(|d| (d.class.clone(), d.into_value()))
                .collect(),
        )
    }

    /// Parse a root container. Each entry's own `"class"` key is authoritative;
    /// an entry whose key disagrees with it is rejected.
    pub fn from_value(value: Value) -> Result<Self, DeserializeError> {
        let Value::Map(entries) = value else {
            return Err(DeserializeError::MalformedDocument(format!(
                "root container must be an object, found {}",
                value.kind_name()
            )));
        };
        let mut root = RootDocument::new();
        for (tag, value) in entries {
            let document = Document::from_value(value)?;
            if document.class != tag {
                return Err(DeserializeError::MalformedDocument(format!(
                    "entry '{tag}' holds a '{}' document",
                    document.class
                )));
            }
            root.insert(document);
        }
        Ok(root)
    }
}

impl IntoIterator for RootDocument {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}

impl Serialize for RootDocument {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clone().into_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RootDocument {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RootDocument::from_value(value).map_err(serde::de::Error::custom)
    }
}
