//! Parameter and body deserialization.
//!
//! Turns wire strings into raw JSON values shaped the way the parameter's
//! style says (scalar, list or mapping) before schema casting. Values stay
//! strings; the caster coerces them.

use portcullis_spec::{
    Parameter, ParameterLocation, ParameterStyle, Schema, SchemaArena, SchemaId, SchemaType,
};
use serde_json::{Map, Value};

use crate::error::DeserializeError;
use crate::message::parse_query;
use crate::schema::{accepts_additional, declared_closure};

/// What a parameter's schema expects, as far as splitting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Primitive,
    Array,
    Object,
}

impl Shape {
    pub fn of(schema: Option<&Schema>) -> Self {
        match schema {
            Some(s) if s.primary_type() == Some(SchemaType::Array) => Self::Array,
            Some(s) if s.types.is_empty() && s.items.is_some() => Self::Array,
            Some(s) if s.is_object_like() => Self::Object,
            _ => Self::Primitive,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Primitive => "primitive",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// The raw values of one location.
pub struct RawParameters<'a> {
    pairs: &'a [(String, String)],
    /// Header semantics: case-insensitive names, repeats joined with ",".
    headers: bool,
    /// Names owned by sibling parameters; never folded into a free-form object.
    claimed: Vec<&'a str>,
}

impl<'a> RawParameters<'a> {
    /// Query, path or cookie pairs.
    pub fn new(pairs: &'a [(String, String)]) -> Self {
        Self {
            pairs,
            headers: false,
            claimed: Vec::new(),
        }
    }

    pub fn headers(pairs: &'a [(String, String)]) -> Self {
        Self {
            pairs,
            headers: true,
            claimed: Vec::new(),
        }
    }

    /// Mark `names` as belonging to other parameters of the same location.
    pub fn claimed_by(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.claimed = names.into_iter().collect();
        self
    }

    fn matches(&self, key: &str, name: &str) -> bool {
        if self.headers {
            key.eq_ignore_ascii_case(name)
        } else {
            key == name
        }
    }

    fn values(&self, name: &str) -> Vec<&'a str> {
        self.pairs
            .iter()
            .filter(|(k, _)| self.matches(k, name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The single wire value for `name`.
    fn single(&self, name: &str) -> Option<String> {
        let values = self.values(name);
        match values.as_slice() {
            [] => None,
            [one] => Some((*one).to_string()),
            [first, ..] if !self.headers => Some((*first).to_string()),
            many => Some(many.join(",")),
        }
    }

    fn pairs(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Deserialize one parameter. `Ok(None)` means it is absent.
pub fn deserialize_parameter(
    param: &Parameter,
    arena: &SchemaArena,
    raw: &RawParameters<'_>,
) -> Result<Option<Value>, DeserializeError> {
    if let Some((media_type, _)) = &param.content {
        return raw
            .single(&param.name)
            .map(|v| decode_content(media_type, &v))
            .transpose();
    }

    check_style(param)?;

    if param.location == ParameterLocation::Query
        && !param.allow_empty_value
        && param.style != ParameterStyle::DeepObject
        && raw.values(&param.name).iter().any(|v| v.is_empty())
    {
        return Err(DeserializeError::EmptyValue);
    }

    let schema = param.schema.map(|id| arena.get(id));
    let shape = Shape::of(schema);

    match param.style {
        ParameterStyle::Form => form(param, shape, arena, raw),
        ParameterStyle::SpaceDelimited => delimited(param, shape, raw, ' '),
        ParameterStyle::PipeDelimited => delimited(param, shape, raw, '|'),
        ParameterStyle::DeepObject => Ok(deep_object(&param.name, raw)),
        ParameterStyle::Simple | ParameterStyle::Label | ParameterStyle::Matrix => raw
            .single(&param.name)
            .map(|v| deserialize_single(param.style, param.explode, shape, &param.name, &v))
            .transpose(),
    }
}

fn check_style(param: &Parameter) -> Result<(), DeserializeError> {
    use ParameterLocation::*;
    use ParameterStyle::*;

    let supported = match param.style {
        Simple => matches!(param.location, Path | Header),
        Label | Matrix => param.location == Path,
        Form => matches!(param.location, Query | Cookie),
        SpaceDelimited | PipeDelimited | DeepObject => param.location == Query,
    };
    if supported {
        Ok(())
    } else {
        Err(DeserializeError::UnsupportedStyle {
            style: param.style,
            location: param.location,
        })
    }
}

fn form(
    param: &Parameter,
    shape: Shape,
    arena: &SchemaArena,
    raw: &RawParameters<'_>,
) -> Result<Option<Value>, DeserializeError> {
    let name = &param.name;
    match shape {
        Shape::Primitive => Ok(raw.single(name).map(Value::String)),
        Shape::Array => {
            let values = raw.values(name);
            match values.first() {
                None => Ok(None),
                Some(_) if param.explode => Ok(Some(strings(values))),
                Some(first) => Ok(Some(split_array(first, ','))),
            }
        }
        Shape::Object if param.explode => {
            // Each property travels as its own `key=value` pair.
            let Some(id) = param.schema else {
                return Ok(None);
            };
            let declared = declared_closure(arena, id);
            let open = declared.is_empty() || accepts_additional(arena, id);
            let map: Map<String, Value> = raw
                .pairs()
                .filter(|(k, _)| {
                    declared.contains(*k) || (open && !raw.claimed.contains(k))
                })
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect();
            Ok((!map.is_empty()).then_some(Value::Object(map)))
        }
        Shape::Object => raw
            .single(name)
            .map(|v| split_pairs(&v, ',', ParameterStyle::Form))
            .transpose(),
    }
}

fn delimited(
    param: &Parameter,
    shape: Shape,
    raw: &RawParameters<'_>,
    delimiter: char,
) -> Result<Option<Value>, DeserializeError> {
    let values = raw.values(&param.name);
    let Some(first) = values.first() else {
        return Ok(None);
    };
    match shape {
        Shape::Primitive => Ok(Some(Value::String((*first).to_string()))),
        Shape::Array if param.explode => Ok(Some(strings(values))),
        Shape::Array => Ok(Some(split_array(first, delimiter))),
        Shape::Object => split_pairs(first, delimiter, param.style).map(Some),
    }
}

/// `name[key]=value` pairs.
fn deep_object(name: &str, raw: &RawParameters<'_>) -> Option<Value> {
    let prefix = format!("{}[", name);
    let map: Map<String, Value> = raw
        .pairs()
        .filter_map(|(k, v)| {
            let key = k.strip_prefix(&prefix)?.strip_suffix(']')?;
            Some((key.to_string(), Value::String(v.to_string())))
        })
        .collect();
    (!map.is_empty()).then_some(Value::Object(map))
}

/// simple, label and matrix styles, which carry the whole value in one string.
pub fn deserialize_single(
    style: ParameterStyle,
    explode: bool,
    shape: Shape,
    name: &str,
    value: &str,
) -> Result<Value, DeserializeError> {
    let missing_prefix = |prefix: String| DeserializeError::MissingPrefix {
        style,
        prefix,
        value: value.to_string(),
    };

    match style {
        ParameterStyle::Label => {
            let body = value
                .strip_prefix('.')
                .ok_or_else(|| missing_prefix(".".into()))?;
            let delimiter = if explode { '.' } else { ',' };
            match shape {
                Shape::Primitive => Ok(Value::String(body.to_string())),
                Shape::Array => Ok(split_array(body, delimiter)),
                Shape::Object if explode => split_assignments(body, '.', style),
                Shape::Object => split_pairs(body, ',', style),
            }
        }
        ParameterStyle::Matrix => {
            let body = value
                .strip_prefix(';')
                .ok_or_else(|| missing_prefix(";".into()))?;
            let named = |part: &str| -> Result<String, DeserializeError> {
                if part == name {
                    return Ok(String::new());
                }
                part.strip_prefix(name)
                    .and_then(|rest| rest.strip_prefix('='))
                    .map(String::from)
                    .ok_or_else(|| missing_prefix(format!(";{}=", name)))
            };
            match shape {
                Shape::Primitive => Ok(Value::String(named(body)?)),
                Shape::Array if explode => body
                    .split(';')
                    .map(|part| named(part).map(Value::String))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                Shape::Array => Ok(split_array(&named(body)?, ',')),
                Shape::Object if explode => split_assignments(body, ';', style),
                Shape::Object => split_pairs(&named(body)?, ',', style),
            }
        }
        _ => match shape {
            Shape::Primitive => Ok(Value::String(value.to_string())),
            Shape::Array => Ok(split_array(value, ',')),
            Shape::Object if explode => split_assignments(value, ',', style),
            Shape::Object => split_pairs(value, ',', style),
        },
    }
}

fn strings(values: Vec<&str>) -> Value {
    Value::Array(
        values
            .into_iter()
            .map(|v| Value::String(v.to_string()))
            .collect(),
    )
}

fn split_array(value: &str, delimiter: char) -> Value {
    if value.is_empty() {
        return Value::Array(Vec::new());
    }
    strings(value.split(delimiter).collect())
}

/// `k,v,k,v` form.
fn split_pairs(value: &str, delimiter: char, style: ParameterStyle) -> Result<Value, DeserializeError> {
    if value.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let tokens: Vec<&str> = value.split(delimiter).collect();
    if tokens.len() % 2 != 0 {
        return Err(DeserializeError::Arity {
            style,
            shape: Shape::Object.as_str(),
            value: value.to_string(),
        });
    }
    Ok(Value::Object(
        tokens
            .chunks(2)
            .map(|pair| (pair[0].to_string(), Value::String(pair[1].to_string())))
            .collect(),
    ))
}

/// `k=v,k=v` form.
fn split_assignments(
    value: &str,
    delimiter: char,
    style: ParameterStyle,
) -> Result<Value, DeserializeError> {
    if value.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    value
        .split(delimiter)
        .map(|part| {
            part.split_once('=')
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .ok_or_else(|| DeserializeError::Arity {
                    style,
                    shape: Shape::Object.as_str(),
                    value: value.to_string(),
                })
        })
        .collect::<Result<Map<_, _>, _>>()
        .map(Value::Object)
}

/// Body encodings the deserializer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// `application/json` and `*/*+json`.
    Json,
    /// `application/x-www-form-urlencoded`.
    Form,
    /// `text/*`.
    Text,
    /// Anything else; left as bytes.
    Binary,
}

impl MediaKind {
    pub fn of(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or(media_type)
            .trim()
            .to_ascii_lowercase();
        if essence == "application/json" || essence.ends_with("+json") {
            Self::Json
        } else if essence == "application/x-www-form-urlencoded" {
            Self::Form
        } else if essence.starts_with("text/") {
            Self::Text
        } else {
            Self::Binary
        }
    }
}

/// Decode a body into a raw value. `Binary` bodies are not handled here.
pub fn deserialize_body(
    kind: MediaKind,
    media_type: &str,
    body: &[u8],
    arena: &SchemaArena,
    schema: Option<SchemaId>,
) -> Result<Value, DeserializeError> {
    let content_error = |reason: String| DeserializeError::Content {
        media_type: media_type.to_string(),
        reason,
    };

    match kind {
        MediaKind::Json => serde_json::from_slice(body).map_err(|e| content_error(e.to_string())),
        MediaKind::Form => {
            let text = std::str::from_utf8(body).map_err(|e| content_error(e.to_string()))?;
            Ok(form_body(&parse_query(text), schema.map(|id| arena.get(id)), arena))
        }
        MediaKind::Text | MediaKind::Binary => String::from_utf8(body.to_vec())
            .map(Value::String)
            .map_err(|e| content_error(e.to_string())),
    }
}

/// Group form fields; array-typed properties collect every repeat.
fn form_body(pairs: &[(String, String)], schema: Option<&Schema>, arena: &SchemaArena) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        let is_array = schema
            .and_then(|s| s.properties.get(key))
            .is_some_and(|id| Shape::of(Some(arena.get(*id))) == Shape::Array);
        if is_array {
            if let Value::Array(items) = map
                .entry(key.clone())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                items.push(Value::String(value.clone()));
            }
        } else if !map.contains_key(key) {
            map.insert(key.clone(), Value::String(value.clone()));
        }
    }
    Value::Object(map)
}

fn decode_content(media_type: &str, value: &str) -> Result<Value, DeserializeError> {
    match MediaKind::of(media_type) {
        MediaKind::Json => serde_json::from_str(value).map_err(|e| DeserializeError::Content {
            media_type: media_type.to_string(),
            reason: e.to_string(),
        }),
        _ => Ok(Value::String(value.to_string())),
    }
}
