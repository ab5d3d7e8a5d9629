//! The recursive cast/validate walk.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use portcullis_spec::{AdditionalProperties, Discriminator, Schema, SchemaId, SchemaType};
use serde_json::{Map, Number, Value};

use super::format::{self, FormatOutcome};
use super::value::{json_eq, json_type_name, Decoded};
use super::{CoercionMode, Direction, SchemaValidator};
use crate::error::{FieldPath, SchemaError, SchemaErrorKind};

type Errors = Vec<SchemaError>;

/// `Ok(None)` means the node says nothing about the value's type.
type Typed = Result<Option<Decoded>, Errors>;

/// Per-call state.
pub(super) struct Context {
    mode: CoercionMode,
    direction: Direction,
    depth: usize,
    /// Bases currently dispatching on their discriminator for the value at hand.
    dispatching: Vec<SchemaId>,
    pub(super) unknown_formats: Vec<String>,
}

impl Context {
    pub(super) fn new(mode: CoercionMode, direction: Direction) -> Self {
        Self {
            mode,
            direction,
            depth: 0,
            dispatching: Vec::new(),
            unknown_formats: Vec::new(),
        }
    }

    fn lenient(&self) -> bool {
        self.mode == CoercionMode::Lenient
    }

    fn forbids(&self, schema: &Schema) -> Option<&'static str> {
        match self.direction {
            Direction::Request if schema.read_only => Some("read-only property in a request"),
            Direction::Response if schema.write_only => Some("write-only property in a response"),
            _ => None,
        }
    }
}

impl SchemaValidator<'_> {
    pub(super) fn cast_root(
        &self,
        id: SchemaId,
        value: &Value,
        ctx: &mut Context,
    ) -> Result<Decoded, Errors> {
        self.cast_node(id, value, &FieldPath::root(), &BTreeSet::new(), ctx)
    }

    fn cast_node(
        &self,
        id: SchemaId,
        value: &Value,
        path: &FieldPath,
        extra: &BTreeSet<String>,
        ctx: &mut Context,
    ) -> Result<Decoded, Errors> {
        Ok(self
            .cast_typed(id, value, path, extra, ctx)?
            .unwrap_or_else(|| Decoded::from_json(value)))
    }

    /// Cast a property or item. Dispatch state belongs to the parent value.
    fn cast_child(
        &self,
        id: SchemaId,
        value: &Value,
        path: &FieldPath,
        ctx: &mut Context,
    ) -> Result<Decoded, Errors> {
        let saved = std::mem::take(&mut ctx.dispatching);
        let result = self.cast_node(id, value, path, &BTreeSet::new(), ctx);
        ctx.dispatching = saved;
        result
    }

    fn cast_typed(
        &self,
        id: SchemaId,
        value: &Value,
        path: &FieldPath,
        extra: &BTreeSet<String>,
        ctx: &mut Context,
    ) -> Typed {
        let limit = self.config.max_depth;
        if ctx.depth >= limit {
            return Err(fail(path, SchemaErrorKind::RecursionLimit { limit }));
        }
        ctx.depth += 1;
        let result = self.cast_inner(id, value, path, extra, ctx);
        ctx.depth -= 1;
        result
    }

    fn cast_inner(
        &self,
        id: SchemaId,
        value: &Value,
        path: &FieldPath,
        extra: &BTreeSet<String>,
        ctx: &mut Context,
    ) -> Typed {
        let schema = self.arena.get(id);

        if value.is_null() && schema.nullable {
            return Ok(Some(Decoded::Null));
        }

        if let (Some(disc), Value::Object(map)) = (&schema.discriminator, value) {
            if !ctx.dispatching.contains(&id) {
                let decoded = self.dispatch(id, schema, disc, map, value, path, extra, ctx)?;
                self.check_values(id, schema, Some(&decoded), value, path)?;
                return Ok(Some(decoded));
            }
        }

        let mut errors = Vec::new();
        let mut merged = match self.cast_own(id, schema, value, path, extra, ctx) {
            Ok(own) => own,
            Err(e) => {
                errors.extend(e);
                None
            }
        };

        if schema.is_composite() && (errors.is_empty() || !self.config.fail_fast) {
            let mut inherited = extra.clone();
            inherited.extend(self.declared(id).iter().cloned());
            match self.cast_compositions(schema, value, path, &inherited, ctx) {
                Ok(Some(d)) => merged = merge(merged, d),
                Ok(None) => {}
                Err(e) => errors.extend(e),
            }
            if let (Some(decoded), Value::Object(raw)) = (merged.as_mut(), value) {
                reorder(decoded, raw);
            }
        }

        if !errors.is_empty() {
            return Err(dedup(errors));
        }

        self.check_values(id, schema, merged.as_ref(), value, path)?;
        Ok(merged)
    }

    /// Resolve the concrete schema named by the discriminator and cast against it.
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        id: SchemaId,
        schema: &Schema,
        disc: &Discriminator,
        map: &Map<String, Value>,
        value: &Value,
        path: &FieldPath,
        extra: &BTreeSet<String>,
        ctx: &mut Context,
    ) -> Result<Decoded, Errors> {
        let tag_path = path.key(&disc.property_name);
        let tag = match map.get(&disc.property_name) {
            Some(Value::String(tag)) => tag,
            Some(other) => return Err(vec![cast_error(&tag_path, "string", other)]),
            None => {
                return Err(fail(
                    &tag_path,
                    SchemaErrorKind::RequiredPropertyMissing {
                        name: disc.property_name.clone(),
                    },
                ))
            }
        };

        let Some(target) = self.resolve_discriminator(id, schema, disc, tag) else {
            return Err(fail(
                &tag_path,
                SchemaErrorKind::UnknownDiscriminator {
                    property: disc.property_name.clone(),
                    value: tag.clone(),
                },
            ));
        };

        ctx.dispatching.push(id);
        let result = self.cast_typed(target, value, path, extra, ctx);
        ctx.dispatching.pop();

        let decoded = result?.unwrap_or_else(|| Decoded::from_json(value));
        let name = self
            .arena
            .get(target)
            .name
            .clone()
            .unwrap_or_else(|| tag.clone());
        Ok(match decoded {
            Decoded::Object(fields) | Decoded::Model { fields, .. } => Decoded::Model { name, fields },
            other => other,
        })
    }

    /// Explicit mapping first; otherwise the value must name a component that
    /// is one of the alternatives (or, for an `allOf` base, extends it).
    fn resolve_discriminator(
        &self,
        id: SchemaId,
        schema: &Schema,
        disc: &Discriminator,
        tag: &str,
    ) -> Option<SchemaId> {
        if let Some(target) = disc.mapping.get(tag) {
            return Some(*target);
        }

        let component = self.arena.component(tag)?;
        let mut alternatives = schema.one_of.iter().chain(&schema.any_of).peekable();
        if alternatives.peek().is_some() {
            alternatives.any(|alt| *alt == component).then_some(component)
        } else {
            let extends = component == id || self.arena.get(component).all_of.contains(&id);
            extends.then_some(component)
        }
    }

    fn cast_compositions(
        &self,
        schema: &Schema,
        value: &Value,
        path: &FieldPath,
        inherited: &BTreeSet<String>,
        ctx: &mut Context,
    ) -> Typed {
        let mut merged = None;

        for member in &schema.all_of {
            if let Some(d) = self.cast_typed(*member, value, path, inherited, ctx)? {
                merged = merge(merged, d);
            }
        }

        if !schema.one_of.is_empty() {
            let mut matches = Vec::new();
            let mut limit = None;
            for branch in &schema.one_of {
                match self.cast_typed(*branch, value, path, inherited, ctx) {
                    Ok(d) => matches.push(d),
                    Err(errors) => limit = limit.or_else(|| recursion_error(errors)),
                }
            }
            match matches.len() {
                0 => {
                    return Err(limit.map(|e| vec![e]).unwrap_or_else(|| {
                        fail(path, SchemaErrorKind::NoValidSchema { keyword: "oneOf" })
                    }))
                }
                1 => {
                    if let Some(Some(d)) = matches.pop() {
                        merged = merge(merged, d);
                    }
                }
                count => {
                    return Err(fail(
                        path,
                        SchemaErrorKind::MultipleValidSchema {
                            keyword: "oneOf",
                            count,
                        },
                    ))
                }
            }
        }

        if !schema.any_of.is_empty() {
            let mut found = None;
            let mut limit = None;
            for branch in &schema.any_of {
                match self.cast_typed(*branch, value, path, inherited, ctx) {
                    Ok(d) => {
                        found = Some(d);
                        break;
                    }
                    Err(errors) => limit = limit.or_else(|| recursion_error(errors)),
                }
            }
            match found {
                Some(Some(d)) => merged = merge(merged, d),
                Some(None) => {}
                None => {
                    return Err(limit.map(|e| vec![e]).unwrap_or_else(|| {
                        fail(path, SchemaErrorKind::NoValidSchema { keyword: "anyOf" })
                    }))
                }
            }
        }

        Ok(merged)
    }

    /// Cast against the node's own `type` (declared or implied).
    fn cast_own(
        &self,
        id: SchemaId,
        schema: &Schema,
        value: &Value,
        path: &FieldPath,
        extra: &BTreeSet<String>,
        ctx: &mut Context,
    ) -> Typed {
        let types = if !schema.types.is_empty() {
            schema.types.clone()
        } else if schema.is_object_like() {
            vec![SchemaType::Object]
        } else if schema.items.is_some() {
            vec![SchemaType::Array]
        } else {
            return Ok(None);
        };

        if let [ty] = types.as_slice() {
            return self.cast_type(*ty, id, schema, value, path, extra, ctx).map(Some);
        }

        for ty in &types {
            match self.cast_type(*ty, id, schema, value, path, extra, ctx) {
                Ok(d) => return Ok(Some(d)),
                // The value has this type's shape, so its errors are the real ones.
                Err(errors) if shape_matches(*ty, value) => return Err(errors),
                Err(_) => {}
            }
        }
        Err(vec![cast_error(path, type_list(&types), value)])
    }

    #[allow(clippy::too_many_arguments)]
    fn cast_type(
        &self,
        ty: SchemaType,
        id: SchemaId,
        schema: &Schema,
        value: &Value,
        path: &FieldPath,
        extra: &BTreeSet<String>,
        ctx: &mut Context,
    ) -> Result<Decoded, Errors> {
        let lenient = ctx.lenient();
        let mismatch = || vec![cast_error(path, ty, value)];

        match ty {
            SchemaType::Null => match value {
                Value::Null => Ok(Decoded::Null),
                _ => Err(mismatch()),
            },
            SchemaType::Boolean => match value {
                Value::Bool(b) => Ok(Decoded::Bool(*b)),
                Value::String(s) if lenient => parse_bool(s).map(Decoded::Bool).ok_or_else(mismatch),
                _ => Err(mismatch()),
            },
            SchemaType::Integer => {
                let n = match value {
                    Value::Number(n) => integer_from_number(n),
                    Value::String(s) if lenient => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(mismatch)?;
                if let Some(f) = self.active_format(schema) {
                    format::check_integer(f, n).map_err(|reason| invalid(path, reason))?;
                }
                Ok(Decoded::Integer(n))
            }
            SchemaType::Number => {
                let n = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) if lenient => {
                        s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
                    }
                    _ => None,
                }
                .ok_or_else(mismatch)?;
                if let Some(f) = self.active_format(schema) {
                    format::check_number(f, n).map_err(|reason| invalid(path, reason))?;
                }
                Ok(Decoded::Number(n))
            }
            SchemaType::String => match value {
                Value::String(s) => self.cast_string(schema, s, path, ctx),
                _ => Err(mismatch()),
            },
            SchemaType::Array => match value {
                Value::Array(items) => self.cast_array(schema, items, path, ctx),
                _ => Err(mismatch()),
            },
            SchemaType::Object => match value {
                Value::Object(map) => self.cast_object(id, schema, map, path, extra, ctx),
                _ => Err(mismatch()),
            },
        }
    }

    fn active_format<'a>(&self, schema: &'a Schema) -> Option<&'a str> {
        schema
            .format
            .as_deref()
            .filter(|_| self.config.validate_formats)
    }

    fn cast_string(
        &self,
        schema: &Schema,
        s: &str,
        path: &FieldPath,
        ctx: &mut Context,
    ) -> Result<Decoded, Errors> {
        let Some(fmt) = schema.format.as_deref() else {
            return Ok(Decoded::String(s.to_string()));
        };
        if !self.config.validate_formats {
            if !format::is_known(fmt) {
                ctx.unknown_formats.push(fmt.to_string());
            }
            return Ok(Decoded::String(s.to_string()));
        }

        match format::decode_string(fmt, s) {
            FormatOutcome::Decoded(d) => Ok(d),
            FormatOutcome::Invalid(reason) => Err(invalid(path, reason)),
            FormatOutcome::Passthrough => Ok(Decoded::String(s.to_string())),
            FormatOutcome::Unknown => {
                tracing::debug!(format = fmt, "unknown string format, passing through");
                ctx.unknown_formats.push(fmt.to_string());
                Ok(Decoded::String(s.to_string()))
            }
        }
    }

    fn cast_array(
        &self,
        schema: &Schema,
        items: &[Value],
        path: &FieldPath,
        ctx: &mut Context,
    ) -> Result<Decoded, Errors> {
        let mut out = Vec::with_capacity(items.len());
        let mut errors = Vec::new();

        for (i, item) in items.iter().enumerate() {
            let result = match schema.items {
                Some(item_id) => self.cast_child(item_id, item, &path.index(i), ctx),
                None => Ok(Decoded::from_json(item)),
            };
            match result {
                Ok(d) => out.push(d),
                Err(e) => {
                    errors.extend(e);
                    if self.config.fail_fast {
                        break;
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(Decoded::Array(out))
        } else {
            Err(errors)
        }
    }

    fn cast_object(
        &self,
        id: SchemaId,
        schema: &Schema,
        map: &Map<String, Value>,
        path: &FieldPath,
        extra: &BTreeSet<String>,
        ctx: &mut Context,
    ) -> Result<Decoded, Errors> {
        let declared = self.declared(id);
        let mut fields = IndexMap::new();
        let mut errors = Vec::new();

        for name in &schema.required {
            if map.contains_key(name) {
                continue;
            }
            let exempt = schema
                .properties
                .get(name)
                .is_some_and(|pid| ctx.forbids(self.arena.get(*pid)).is_some());
            if !exempt {
                errors.push(SchemaError::new(
                    path.key(name),
                    SchemaErrorKind::RequiredPropertyMissing { name: name.clone() },
                ));
            }
        }

        // A schema that declares no properties anywhere is free-form.
        let free_form = declared.is_empty() && extra.is_empty();

        for (key, raw) in map {
            if self.config.fail_fast && !errors.is_empty() {
                break;
            }
            let key_path = path.key(key);

            if let Some(pid) = schema.properties.get(key) {
                if let Some(reason) = ctx.forbids(self.arena.get(*pid)) {
                    errors.extend(invalid(&key_path, reason.to_string()));
                    continue;
                }
                match self.cast_child(*pid, raw, &key_path, ctx) {
                    Ok(d) => {
                        fields.insert(key.clone(), d);
                    }
                    Err(e) => errors.extend(e),
                }
                continue;
            }

            // Declared by a sibling in the composition; cast there.
            if declared.contains(key) || extra.contains(key) {
                continue;
            }

            match schema.additional_properties {
                AdditionalProperties::Schema(aid) => match self.cast_child(aid, raw, &key_path, ctx) {
                    Ok(d) => {
                        fields.insert(key.clone(), d);
                    }
                    Err(e) => errors.extend(e),
                },
                AdditionalProperties::Allowed => {
                    fields.insert(key.clone(), Decoded::from_json(raw));
                }
                AdditionalProperties::Unspecified
                    if free_form || !self.config.strict_additional_properties =>
                {
                    fields.insert(key.clone(), Decoded::from_json(raw));
                }
                AdditionalProperties::Unspecified | AdditionalProperties::Denied => {
                    errors.push(SchemaError::new(
                        key_path,
                        SchemaErrorKind::UnexpectedProperty { name: key.clone() },
                    ));
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        for (name, pid) in &schema.properties {
            if map.contains_key(name) {
                continue;
            }
            let prop = self.arena.get(*pid);
            let Some(default) = &prop.default else {
                continue;
            };
            if ctx.forbids(prop).is_some() {
                continue;
            }
            match self.cast_child(*pid, default, &path.key(name), ctx) {
                Ok(d) => {
                    fields.insert(name.clone(), d);
                }
                Err(e) => {
                    tracing::debug!(property = %name, errors = e.len(), "ignoring invalid default");
                }
            }
        }

        Ok(Decoded::Object(fields))
    }

    /// `enum`, `const` and the compiled constraint keywords.
    fn check_values(
        &self,
        id: SchemaId,
        schema: &Schema,
        decoded: Option<&Decoded>,
        raw: &Value,
        path: &FieldPath,
    ) -> Result<(), Errors> {
        let json = decoded.map(Decoded::to_json).unwrap_or_else(|| raw.clone());
        let mut errors = Vec::new();

        if let Some(values) = &schema.enum_values {
            if !values.iter().any(|v| json_eq(v, &json)) {
                errors.extend(invalid(
                    path,
                    format!("{} is not one of {}", json, Value::Array(values.clone())),
                ));
            }
        }

        if let Some(expected) = &schema.const_value {
            if !json_eq(expected, &json) {
                errors.extend(invalid(path, format!("{} is not equal to {}", json, expected)));
            }
        }

        for reason in self.constraints.violations(id, &json) {
            errors.extend(invalid(path, reason));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn fail(path: &FieldPath, kind: SchemaErrorKind) -> Errors {
    vec![SchemaError::new(path.clone(), kind)]
}

fn invalid(path: &FieldPath, reason: String) -> Errors {
    fail(path, SchemaErrorKind::InvalidSchemaValue { reason })
}

fn cast_error(path: &FieldPath, expected: impl ToString, value: &Value) -> SchemaError {
    SchemaError::new(
        path.clone(),
        SchemaErrorKind::Cast {
            expected: expected.to_string(),
            found: json_type_name(value).to_string(),
        },
    )
}

fn recursion_error(errors: Errors) -> Option<SchemaError> {
    errors
        .into_iter()
        .find(|e| matches!(e.kind, SchemaErrorKind::RecursionLimit { .. }))
}

fn type_list(types: &[SchemaType]) -> String {
    types
        .iter()
        .map(SchemaType::as_str)
        .collect::<Vec<_>>()
        .join(" or ")
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Integers, and floats with no fractional part (`2.0`).
fn integer_from_number(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// Whether `value` has the JSON shape of `ty`, ignoring lenient coercion.
fn shape_matches(ty: SchemaType, value: &Value) -> bool {
    match (ty, value) {
        (SchemaType::Null, Value::Null)
        | (SchemaType::Boolean, Value::Bool(_))
        | (SchemaType::Number, Value::Number(_))
        | (SchemaType::String, Value::String(_))
        | (SchemaType::Array, Value::Array(_))
        | (SchemaType::Object, Value::Object(_)) => true,
        (SchemaType::Integer, Value::Number(n)) => integer_from_number(n).is_some(),
        _ => false,
    }
}

fn into_fields(d: Decoded) -> Result<(Option<String>, IndexMap<String, Decoded>), Decoded> {
    match d {
        Decoded::Object(fields) => Ok((None, fields)),
        Decoded::Model { name, fields } => Ok((Some(name), fields)),
        other => Err(other),
    }
}

fn from_fields(name: Option<String>, fields: IndexMap<String, Decoded>) -> Decoded {
    match name {
        Some(name) => Decoded::Model { name, fields },
        None => Decoded::Object(fields),
    }
}

/// Combine the results of sibling schemas. Objects union their fields;
/// otherwise the first typed result wins.
fn merge(current: Option<Decoded>, next: Decoded) -> Option<Decoded> {
    let Some(current) = current else {
        return Some(next);
    };
    Some(match (into_fields(current), into_fields(next)) {
        (Ok((name, mut fields)), Ok((next_name, more))) => {
            fields.extend(more);
            from_fields(name.or(next_name), fields)
        }
        (Ok((name, fields)), Err(_)) => from_fields(name, fields),
        (Err(current), _) => current,
    })
}

/// Put merged fields back in wire order; defaults trail.
fn reorder(decoded: &mut Decoded, raw: &Map<String, Value>) {
    let order: HashMap<&str, usize> = raw
        .keys()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();
    let position = |k: &String| order.get(k.as_str()).copied().unwrap_or(usize::MAX);
    if let Decoded::Object(fields) | Decoded::Model { fields, .. } = decoded {
        fields.sort_by(|a, _, b, _| position(a).cmp(&position(b)));
    }
}

fn dedup(errors: Errors) -> Errors {
    let mut out: Errors = Vec::with_capacity(errors.len());
    for e in errors {
        if !out.contains(&e) {
            out.push(e);
        }
    }
    out
}
