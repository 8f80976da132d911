//! Error types for graph persistence.
//!
//! Save and load passes never abort on these: each one is scoped to a single
//! member or entity and recorded as a [`Diagnostic`](crate::Diagnostic).
//! Only codec, store and configuration failures are returned as `Err`.

use thiserror::Error;

/// Errors that can occur while serializing an object graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializeError {
    /// A scalar member could not be converted to a [`Value`](crate::Value).
    #[error("failed to serialize field '{field}': {message}")]
    FieldError { field: String, message: String },
    /// A sequence or map holds raw references instead of holder entities.
    #[error(
        "collection of '{type_name}' holds raw references; wrap each element in a holder entity such as RefWrapper"
    )]
    UnsupportedReferenceCollection { type_name: &'static str },
    /// A reference points at something that has no identity-bearing owner.
    #[error("'{type_name}' is not owned by any registered referenceable object")]
    UnsupportedReferenceKind { type_name: &'static str },
    /// The entity is already on the active traversal path.
    #[error("reference cycle through '{type_tag}', writing null")]
    ReferenceCycle { type_tag: &'static str },
    /// Nesting exceeded the configured depth limit.
    #[error("nesting deeper than {limit} levels, writing null")]
    DepthLimitExceeded { limit: usize },
    /// Format encoding error.
    #[error("format error: {0}")]
    FormatError(String),
}

/// Errors that can occur while deserializing an object graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeserializeError {
    /// The type tag is not known to the type registry.
    #[error("unknown type '{tag}'")]
    UnknownType { tag: String },
    /// The document names a member the target type does not persist.
    #[error("type '{type_tag}' has no persisted member '{member}'")]
    UnknownMember { member: String, type_tag: &'static str },
    /// A sequence or map declared with raw reference elements.
    #[error("collection of '{type_name}' holds raw references and cannot be loaded")]
    UnsupportedReferenceCollection { type_name: &'static str },
    /// The document's type cannot be placed in a statically typed slot.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    /// The document does not have the entity document shape.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// The target instance is already being loaded higher up the stack.
    #[error("'{type_tag}' is already being loaded, skipping nested load")]
    ReentrantLoad { type_tag: &'static str },
    /// Nesting exceeded the configured depth limit.
    #[error("nesting deeper than {limit} levels, skipping")]
    DepthLimitExceeded { limit: usize },
    /// A resolved reference could not be adapted to the member type.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// Format decoding error.
    #[error("format error: {0}")]
    FormatError(String),
}

/// Errors raised while assigning a live target to a reference member.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The holder has no reference member by that name.
    #[error("'{type_tag}' has no reference member '{member}'")]
    UnknownMember { member: String, type_tag: &'static str },
    /// The member does not hold references.
    #[error("member is not a reference")]
    NotAReference,
    /// The target is not, and does not contain, the member's referenced type.
    #[error("target is a '{found}', which does not provide '{expected}'")]
    Incompatible {
        expected: &'static str,
        found: &'static str,
    },
    /// The target object has no part of the referenced type yet.
    #[error("'{owner}' has no '{part}' part")]
    MissingPart {
        part: &'static str,
        owner: &'static str,
    },
}

/// Errors from an [`EntityStore`](crate::store::EntityStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// An IO error occurred while reading or writing the backing file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored blob could not be encoded.
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    /// The stored blob could not be decoded.
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
    /// A key in the stored blob is not a decimal UID.
    #[error("invalid UID key '{0}'")]
    InvalidUid(String),
}

/// Errors loading a [`PersistConfig`](crate::PersistConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
