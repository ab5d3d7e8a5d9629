//! Decoded values.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// A value after casting against a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// `format: date`
    Date(NaiveDate),
    /// `format: date-time`
    DateTime(DateTime<FixedOffset>),
    /// `format: uuid`
    Uuid(Uuid),
    /// `format: byte`, or a raw body.
    Bytes(Vec<u8>),
    Array(Vec<Decoded>),
    Object(IndexMap<String, Decoded>),
    /// An object whose concrete schema was picked by a discriminator.
    Model {
        name: String,
        fields: IndexMap<String, Decoded>,
    },
}

impl Decoded {
    /// Untyped conversion, used where no schema applies.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// The JSON wire form. Typed strings render in their canonical format,
    /// bytes as standard base64.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Number(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            Self::Uuid(u) => Value::String(u.hyphenated().to_string()),
            Self::Bytes(b) => Value::String(STANDARD.encode(b)),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(fields) | Self::Model { fields, .. } => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Decoded]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Fields of an object or model.
    pub fn fields(&self) -> Option<&IndexMap<String, Decoded>> {
        match self {
            Self::Object(fields) | Self::Model { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Field lookup on objects and models.
    pub fn get(&self, key: &str) -> Option<&Decoded> {
        self.fields().and_then(|f| f.get(key))
    }

    /// Concrete schema name of a discriminated model.
    pub fn model_name(&self) -> Option<&str> {
        match self {
            Self::Model { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl serde::Serialize for Decoded {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// JSON equality where numbers compare by value (`1 == 1.0`).
pub(crate) fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_eq(v, other)))
        }
        _ => a == b,
    }
}

/// The JSON type name of a raw value, for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_strings_render_canonically() {
        let date = Decoded::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(date.to_json(), json!("2024-02-29"));

        let dt = Decoded::DateTime(DateTime::parse_from_rfc3339("2024-01-01T10:00:00+02:00").unwrap());
        assert_eq!(dt.to_json(), json!("2024-01-01T10:00:00+02:00"));

        assert_eq!(Decoded::Bytes(b"hi".to_vec()).to_json(), json!("aGk="));
    }

    #[test]
    fn model_serializes_as_object() {
        let mut fields = IndexMap::new();
        fields.insert("petType".to_string(), Decoded::String("Cat".into()));
        let model = Decoded::Model {
            name: "Cat".into(),
            fields,
        };
        assert_eq!(model.to_json(), json!({ "petType": "Cat" }));
        assert_eq!(model.model_name(), Some("Cat"));
        assert_eq!(model.get("petType").and_then(Decoded::as_str), Some("Cat"));
        assert_eq!(serde_json::to_value(&model).unwrap(), json!({ "petType": "Cat" }));
    }

    #[test]
    fn json_eq_compares_numbers_by_value() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!json_eq(&json!([1]), &json!([1, 2])));
        assert!(!json_eq(&json!("1"), &json!(1)));
    }
}
