//! Document value tree.
//!
//! [`Value`] is the in-memory shape of everything a save pass writes: nulls,
//! scalars, embedded entity documents, reference tokens, sequences and maps.
//! It serializes to the natural JSON shape, so any serde text format carries
//! it without loss.
//!
//! Use [`to_value`] and [`from_value`] to convert between arbitrary serde
//! types and `Value`.

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap as _, SerializeSeq as _};
use serde::{Deserialize, Serialize};

use crate::error::{DeserializeError, SerializeError};

/// Format-agnostic value representation for persisted members.
///
/// Integers are normalized: anything that fits in an `i64` is stored as
/// [`Value::I64`], so a reference token and a plain integer compare equal
/// regardless of which side produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    List(Vec<Value>),
    /// Ordered object; keys keep insertion order.
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Normalizing constructor for unsigned integers.
    pub fn from_u64(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(v) => Value::I64(v),
            Err(_) => Value::U64(v),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(v) => Some(v),
            Value::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up an entry of a [`Value::Map`] by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) | Value::U64(_) => "integer",
            Value::F64(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

// ---------------------------------------------------------------------------
// Text shape: Value <-> any serde format
// ---------------------------------------------------------------------------

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TextVisitor)
    }
}

struct TextVisitor;

impl<'de> Visitor<'de> for TextVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any document value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }
    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }
    fn visit_some<D: serde::Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }
    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::I64(v))
    }
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from_u64(v))
    }
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::F64(v))
    }
    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }
    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }
}

// ---------------------------------------------------------------------------
// Plain data: T <-> Value through serde_json's value tree
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(v),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Value::I64(v)
                } else if let Some(v) = n.as_u64() {
                    Value::U64(v)
                } else {
                    n.as_f64().map_or(Value::Null, Value::F64)
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    /// Non-finite floats have no JSON form and become null.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(v),
            Value::I64(v) => v.into(),
            Value::U64(v) => v.into(),
            Value::F64(v) => serde_json::Number::from_f64(v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

/// Convert any `T: Serialize` into a [`Value`].
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, SerializeError> {
    serde_json::to_value(value)
        .map(Value::from)
        .map_err(|e| SerializeError::FieldError {
            field: String::new(),
            message: e.to_string(),
        })
}

/// Convert a [`Value`] back into any `T: DeserializeOwned`.
pub fn from_value<T: de::DeserializeOwned>(value: Value) -> Result<T, DeserializeError> {
    serde_json::from_value(value.into()).map_err(|e| DeserializeError::FormatError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn roundtrip_primitives() {
        assert!(from_value::<bool>(to_value(&true).unwrap()).unwrap());
        assert_eq!(from_value::<i32>(to_value(&42i32).unwrap()).unwrap(), 42);
        assert_eq!(from_value::<u64>(to_value(&99u64).unwrap()).unwrap(), 99);
        assert_eq!(from_value::<f32>(to_value(&1.5f32).unwrap()).unwrap(), 1.5);
        assert_eq!(from_value::<f64>(to_value(&1.5f64).unwrap()).unwrap(), 1.5);
        assert_eq!(
            from_value::<String>(to_value(&"hello").unwrap()).unwrap(),
            "hello"
        );
    }

    #[test]
    fn unsigned_integers_normalize() {
        assert_eq!(to_value(&7u32).unwrap(), Value::I64(7));
        assert_eq!(to_value(&u64::MAX).unwrap(), Value::U64(u64::MAX));
        assert_eq!(from_value::<u64>(Value::U64(u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn roundtrip_option() {
        let some: Option<i32> = Some(42);
        let none: Option<i32> = None;
        assert_eq!(
            from_value::<Option<i32>>(to_value(&some).unwrap()).unwrap(),
            Some(42)
        );
        assert_eq!(
            from_value::<Option<i32>>(to_value(&none).unwrap()).unwrap(),
            None
        );
    }

    #[test]
    fn roundtrip_enum() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        enum Color {
            Red,
            Custom { r: u8, g: u8, b: u8 },
        }
        assert_eq!(
            from_value::<Color>(to_value(&Color::Red).unwrap()).unwrap(),
            Color::Red
        );
        assert_eq!(
            from_value::<Color>(to_value(&Color::Custom { r: 1, g: 2, b: 3 }).unwrap()).unwrap(),
            Color::Custom { r: 1, g: 2, b: 3 }
        );
    }

    #[test]
    fn integer_keyed_maps_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert(3u32, "three".to_string());
        map.insert(10u32, "ten".to_string());
        let val = to_value(&map).unwrap();
        assert_eq!(val.get("3"), Some(&Value::from("three")));
        let restored: BTreeMap<u32, String> = from_value(val).unwrap();
        assert_eq!(restored, map);
    }

    #[test]
    fn struct_fields_keep_declaration_order() {
        #[derive(Serialize)]
        struct Tint {
            r: u8,
            g: u8,
            b: u8,
        }
        let Value::Map(entries) = to_value(&Tint { r: 1, g: 2, b: 3 }).unwrap() else {
            panic!("expected a map");
        };
        let keys: Vec<_> = entries.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["r", "g", "b"]);
    }

    #[test]
    fn non_finite_floats_have_no_plain_form() {
        assert_eq!(to_value(&f64::NAN).unwrap(), Value::Null);
        assert!(from_value::<f64>(Value::Null).is_err());
    }

    #[test]
    fn json_text_shape() {
        let value = Value::Map(vec![
            ("class".into(), Value::from("Player")),
            ("hp".into(), Value::I64(10)),
            ("tags".into(), Value::List(vec![Value::Null, Value::Bool(true)])),
        ]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"class":"Player","hp":10,"tags":[null,true]}"#);
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn json_large_unsigned_survives() {
        let back: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(back, Value::U64(u64::MAX));
        let back: Value = serde_json::from_str("1002").unwrap();
        assert_eq!(back, Value::I64(1002));
    }
}
