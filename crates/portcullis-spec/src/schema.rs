//! Schema nodes and the arena that owns them.
//!
//! `$ref`s are resolved to [`SchemaId`]s when the arena is built. A schema
//! that refers to itself (directly, through `properties`, `items` or `allOf`)
//! simply points back at an id already in the arena.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::SpecVersion;
use crate::parser::resolve_ref;

/// Keywords checked by the constraint validator rather than the caster.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
    "format",
];

const COMPONENT_SCHEMA_PREFIX: &str = "#/components/schemas/";

/// Index of a schema node inside a [`SchemaArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Primitive JSON Schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl SchemaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `additionalProperties` keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdditionalProperties {
    /// Keyword absent.
    #[default]
    Unspecified,
    /// `true` or `{}`.
    Allowed,
    /// `false`.
    Denied,
    /// A schema every extra property must satisfy.
    Schema(SchemaId),
}

/// Polymorphism hint for `oneOf`/`anyOf`/base schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discriminator {
    pub property_name: String,
    /// Discriminator value to concrete schema.
    pub mapping: IndexMap<String, SchemaId>,
}

/// A single schema node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Component name when defined under `components.schemas`.
    pub name: Option<String>,
    /// Declared types, `null` excluded. Empty means any type.
    pub types: Vec<SchemaType>,
    pub format: Option<String>,
    /// 3.0 `nullable: true` or a 3.1 type list containing "null".
    pub nullable: bool,
    pub required: Vec<String>,
    pub properties: IndexMap<String, SchemaId>,
    pub additional_properties: AdditionalProperties,
    pub items: Option<SchemaId>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub default: Option<Value>,
    pub all_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub discriminator: Option<Discriminator>,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
    /// Leftover constraint keywords, in JSON Schema 2020-12 form.
    pub constraints: Map<String, Value>,
}

impl Schema {
    /// The first declared type, if any.
    pub fn primary_type(&self) -> Option<SchemaType> {
        self.types.first().copied()
    }

    pub fn is_composite(&self) -> bool {
        !self.all_of.is_empty() || !self.one_of.is_empty() || !self.any_of.is_empty()
    }

    /// Whether the schema looks like an object schema, declared or implied.
    pub fn is_object_like(&self) -> bool {
        self.types.contains(&SchemaType::Object)
            || (self.types.is_empty()
                && (!self.properties.is_empty()
                    || !self.required.is_empty()
                    || self.additional_properties != AdditionalProperties::Unspecified))
    }
}

/// Owns every schema node of a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaArena {
    nodes: Vec<Schema>,
    components: IndexMap<String, SchemaId>,
}

impl SchemaArena {
    /// Build an arena for a standalone schema document.
    ///
    /// Local `$ref`s resolve against `schema` itself, so a document with its
    /// own `components.schemas` (or `$defs`) works.
    pub fn from_standalone(
        schema: &Value,
        version: SpecVersion,
    ) -> Result<(Self, SchemaId), ParseError> {
        let mut loader = SchemaLoader::new(schema, version);
        loader.load_components()?;
        let id = loader.load(schema)?;
        Ok((loader.finish(), id))
    }

    pub fn get(&self, id: SchemaId) -> &Schema {
        &self.nodes[id.0]
    }

    /// Look up a component schema by name.
    pub fn component(&self, name: &str) -> Option<SchemaId> {
        self.components.get(name).copied()
    }

    pub fn components(&self) -> impl Iterator<Item = (&str, SchemaId)> {
        self.components.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &Schema)> {
        self.nodes.iter().enumerate().map(|(i, s)| (SchemaId(i), s))
    }
}

/// Builds a [`SchemaArena`] from raw JSON, resolving `$ref`s as it goes.
pub(crate) struct SchemaLoader<'r> {
    root: &'r Value,
    version: SpecVersion,
    nodes: Vec<Schema>,
    components: IndexMap<String, SchemaId>,
    by_ref: HashMap<String, SchemaId>,
}

impl<'r> SchemaLoader<'r> {
    pub(crate) fn new(root: &'r Value, version: SpecVersion) -> Self {
        Self {
            root,
            version,
            nodes: Vec::new(),
            components: IndexMap::new(),
            by_ref: HashMap::new(),
        }
    }

    /// Load every `components.schemas` entry so each gets a stable id.
    pub(crate) fn load_components(&mut self) -> Result<(), ParseError> {
        let Some(schemas) = self
            .root
            .pointer("/components/schemas")
            .and_then(|v| v.as_object())
        else {
            return Ok(());
        };

        for name in schemas.keys() {
            let pointer = format!("{}{}", COMPONENT_SCHEMA_PREFIX, escape_pointer(name));
            let id = self.load_ref(&pointer)?;
            self.components.insert(name.clone(), id);
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> SchemaArena {
        SchemaArena {
            nodes: self.nodes,
            components: self.components,
        }
    }

    /// Load a schema value and return its id.
    pub(crate) fn load(&mut self, value: &Value) -> Result<SchemaId, ParseError> {
        if let Some(ref_str) = value.get("$ref").and_then(|v| v.as_str()) {
            return self.load_ref(ref_str);
        }
        let id = self.reserve();
        let schema = self.build(value, None)?;
        self.nodes[id.0] = schema;
        Ok(id)
    }

    fn load_ref(&mut self, ref_str: &str) -> Result<SchemaId, ParseError> {
        if let Some(id) = self.by_ref.get(ref_str) {
            return Ok(*id);
        }

        // A chain of refs to refs shares the final target's id.
        let mut aliases = vec![ref_str.to_string()];
        let target = loop {
            let current = aliases.last().map(String::as_str).unwrap_or(ref_str);
            let target = resolve_ref(self.root, current)
                .ok_or_else(|| ParseError::UnresolvedRef(current.to_string()))?;
            let Some(next) = target.get("$ref").and_then(|v| v.as_str()) else {
                break target;
            };
            if let Some(id) = self.by_ref.get(next).copied() {
                self.register(aliases, id);
                return Ok(id);
            }
            if aliases.iter().any(|a| a == next) {
                return Err(ParseError::Schema(format!(
                    "circular $ref detected: {}",
                    next
                )));
            }
            aliases.push(next.to_string());
        };

        let name = aliases
            .last()
            .and_then(|r| r.strip_prefix(COMPONENT_SCHEMA_PREFIX))
            .map(unescape_pointer);

        // Register before building so cycles resolve to this id.
        let id = self.reserve();
        self.register(aliases, id);

        let schema = self.build(target, name)?;
        self.nodes[id.0] = schema;
        Ok(id)
    }

    fn register(&mut self, refs: Vec<String>, id: SchemaId) {
        for r in refs {
            self.by_ref.insert(r, id);
        }
    }

    fn reserve(&mut self) -> SchemaId {
        self.nodes.push(Schema::default());
        SchemaId(self.nodes.len() - 1)
    }

    fn build(&mut self, value: &Value, name: Option<String>) -> Result<Schema, ParseError> {
        let obj = match value {
            Value::Object(obj) => obj,
            // 3.1 boolean schemas: `true` accepts anything, `false` nothing.
            Value::Bool(accept) => {
                let mut schema = Schema {
                    name,
                    ..Schema::default()
                };
                if !accept {
                    schema
                        .constraints
                        .insert("not".into(), Value::Object(Map::new()));
                }
                return Ok(schema);
            }
            other => {
                return Err(ParseError::Schema(format!(
                    "schema must be an object, got {}",
                    other
                )))
            }
        };

        let mut schema = Schema {
            name,
            ..Schema::default()
        };

        match obj.get("type") {
            Some(Value::String(t)) => self.push_type(&mut schema, t)?,
            Some(Value::Array(types)) => {
                for t in types {
                    let t = t.as_str().ok_or_else(|| {
                        ParseError::Schema("'type' entries must be strings".into())
                    })?;
                    self.push_type(&mut schema, t)?;
                }
            }
            Some(other) => {
                return Err(ParseError::Schema(format!(
                    "'type' must be a string or array, got {}",
                    other
                )))
            }
            None => {}
        }

        schema.format = obj.get("format").and_then(|v| v.as_str()).map(String::from);
        if obj.get("nullable").and_then(|v| v.as_bool()).unwrap_or(false) {
            schema.nullable = true;
        }

        schema.required = obj
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(props) = obj.get("properties").and_then(|v| v.as_object()) {
            for (prop_name, prop) in props {
                let id = self.load(prop)?;
                schema.properties.insert(prop_name.clone(), id);
            }
        }

        schema.additional_properties = match obj.get("additionalProperties") {
            None => AdditionalProperties::Unspecified,
            Some(Value::Bool(true)) => AdditionalProperties::Allowed,
            Some(Value::Bool(false)) => AdditionalProperties::Denied,
            Some(Value::Object(o)) if o.is_empty() => AdditionalProperties::Allowed,
            Some(other) => AdditionalProperties::Schema(self.load(other)?),
        };

        if let Some(items) = obj.get("items") {
            schema.items = Some(self.load(items)?);
        }

        schema.enum_values = obj.get("enum").and_then(|v| v.as_array()).cloned();
        schema.const_value = obj.get("const").cloned();
        schema.default = obj.get("default").cloned();

        schema.all_of = self.load_list(obj, "allOf")?;
        schema.one_of = self.load_list(obj, "oneOf")?;
        schema.any_of = self.load_list(obj, "anyOf")?;

        if let Some(disc) = obj.get("discriminator").and_then(|v| v.as_object()) {
            schema.discriminator = Some(self.load_discriminator(disc)?);
        }

        schema.read_only = obj.get("readOnly").and_then(|v| v.as_bool()).unwrap_or(false);
        schema.write_only = obj
            .get("writeOnly")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        schema.deprecated = obj
            .get("deprecated")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        schema.constraints = self.extract_constraints(obj);

        Ok(schema)
    }

    fn push_type(&self, schema: &mut Schema, t: &str) -> Result<(), ParseError> {
        match SchemaType::parse(t) {
            Some(SchemaType::Null) => schema.nullable = true,
            Some(ty) => {
                if !schema.types.contains(&ty) {
                    schema.types.push(ty);
                }
            }
            None => return Err(ParseError::Schema(format!("unknown schema type '{}'", t))),
        }
        Ok(())
    }

    fn load_list(
        &mut self,
        obj: &Map<String, Value>,
        keyword: &str,
    ) -> Result<Vec<SchemaId>, ParseError> {
        let Some(arr) = obj.get(keyword) else {
            return Ok(Vec::new());
        };
        let arr = arr
            .as_array()
            .ok_or_else(|| ParseError::Schema(format!("'{}' must be an array", keyword)))?;
        arr.iter().map(|v| self.load(v)).collect()
    }

    fn load_discriminator(&mut self, disc: &Map<String, Value>) -> Result<Discriminator, ParseError> {
        let property_name = disc
            .get("propertyName")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParseError::Schema("discriminator missing 'propertyName'".into()))?
            .to_string();

        let mut mapping = IndexMap::new();
        if let Some(map) = disc.get("mapping").and_then(|v| v.as_object()) {
            for (value, target) in map {
                let target = target.as_str().ok_or_else(|| {
                    ParseError::Schema(format!("discriminator mapping '{}' must be a string", value))
                })?;
                // Mapping targets are either refs or bare component names.
                let ref_str = if target.starts_with('#') {
                    target.to_string()
                } else {
                    format!("{}{}", COMPONENT_SCHEMA_PREFIX, escape_pointer(target))
                };
                mapping.insert(value.clone(), self.load_ref(&ref_str)?);
            }
        }

        Ok(Discriminator {
            property_name,
            mapping,
        })
    }

    /// Copy constraint keywords, normalising 3.0 boolean exclusive bounds.
    fn extract_constraints(&self, obj: &Map<String, Value>) -> Map<String, Value> {
        let mut constraints: Map<String, Value> = CONSTRAINT_KEYWORDS
            .iter()
            .filter_map(|k| obj.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect();

        if self.version == SpecVersion::V30 {
            for (exclusive, bound) in [("exclusiveMinimum", "minimum"), ("exclusiveMaximum", "maximum")]
            {
                if let Some(Value::Bool(flag)) = constraints.get(exclusive).cloned() {
                    constraints.remove(exclusive);
                    if flag {
                        if let Some(limit) = constraints.remove(bound) {
                            constraints.insert(exclusive.to_string(), limit);
                        }
                    }
                }
            }
        }

        constraints
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
