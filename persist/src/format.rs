//! Text encoding and decoding of documents.
//!
//! Provides [`encode`] and [`decode`] functions that convert between
//! serde-serializable types and byte buffers in JSON or (feature-gated) RON.

use serde::{Deserialize, Serialize};

use crate::error::{DeserializeError, SerializeError};

/// Supported text formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// Compact JSON.
    #[default]
    Json,
    /// Indented JSON, convenient for diffing save files.
    PrettyJson,
    /// RON (Rusty Object Notation).
    #[cfg(feature = "serialize-ron")]
    Ron,
}

impl Format {
    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json | Format::PrettyJson => "json",
            #[cfg(feature = "serialize-ron")]
            Format::Ron => "ron",
        }
    }
}

/// Encode a serde-serializable value to bytes in the given format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>, SerializeError> {
    match format {
        Format::Json => {
            serde_json::to_vec(value).map_err(|e| SerializeError::FormatError(e.to_string()))
        }
        Format::PrettyJson => serde_json::to_vec_pretty(value)
            .map_err(|e| SerializeError::FormatError(e.to_string())),
        #[cfg(feature = "serialize-ron")]
        Format::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
            .map(|s| s.into_bytes())
            .map_err(|e| SerializeError::FormatError(e.to_string())),
    }
}

/// Decode bytes in the given format to a serde-deserializable type.
pub fn decode<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
    format: Format,
) -> Result<T, DeserializeError> {
    match format {
        Format::Json | Format::PrettyJson => {
            serde_json::from_slice(bytes).map_err(|e| DeserializeError::FormatError(e.to_string()))
        }
        #[cfg(feature = "serialize-ron")]
        Format::Ron => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| DeserializeError::FormatError(e.to_string()))?;
            ron::from_str(s).map_err(|e| DeserializeError::FormatError(e.to_string()))
        }
    }
}
