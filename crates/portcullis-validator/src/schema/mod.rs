//! Schema casting and validation.
//!
//! [`SchemaValidator`] walks a schema node and a raw value together,
//! coercing the value into a [`Decoded`] and collecting [`SchemaError`]s.
//! Constraint keywords (`minimum`, `pattern`, ...) are delegated to
//! `jsonschema`, compiled once per node when the validator is built.

mod cast;
mod constraints;
mod format;
pub mod value;

use std::collections::{BTreeSet, HashSet};

use portcullis_spec::{AdditionalProperties, SchemaArena, SchemaId};
use serde_json::Value;

use crate::config::ValidatorConfig;
use crate::error::SchemaError;

use constraints::CompiledConstraints;
pub use value::Decoded;

/// How strictly raw values are coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionMode {
    /// Wire strings: `"42"` casts to an integer, `"true"` to a boolean.
    Lenient,
    /// JSON documents: the JSON type must already match.
    Strict,
}

/// Which side of an exchange a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `readOnly` properties are rejected.
    Request,
    /// `writeOnly` properties are rejected.
    Response,
    /// Neither check applies.
    Any,
}

/// Result of a cast, plus formats that were seen but not understood.
#[derive(Debug)]
pub struct CastOutcome {
    pub value: Result<Decoded, Vec<SchemaError>>,
    pub unknown_formats: Vec<String>,
}

/// Casts raw values against the nodes of one schema arena.
pub struct SchemaValidator<'s> {
    arena: &'s SchemaArena,
    constraints: CompiledConstraints,
    /// Property names declared anywhere in each node's `allOf` closure.
    declared: Vec<BTreeSet<String>>,
    config: ValidatorConfig,
}

impl<'s> SchemaValidator<'s> {
    pub fn new(arena: &'s SchemaArena, config: &ValidatorConfig) -> Self {
        let declared = arena
            .iter()
            .map(|(id, _)| declared_closure(arena, id))
            .collect();
        Self {
            arena,
            constraints: CompiledConstraints::compile(arena, config.validate_formats),
            declared,
            config: config.clone(),
        }
    }

    pub fn arena(&self) -> &'s SchemaArena {
        self.arena
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Cast `value` against schema `id`.
    pub fn cast(
        &self,
        id: SchemaId,
        value: &Value,
        mode: CoercionMode,
        direction: Direction,
    ) -> CastOutcome {
        let mut ctx = cast::Context::new(mode, direction);
        let value = self.cast_root(id, value, &mut ctx);
        let mut unknown_formats = ctx.unknown_formats;
        unknown_formats.sort();
        unknown_formats.dedup();
        CastOutcome {
            value,
            unknown_formats,
        }
    }

    fn declared(&self, id: SchemaId) -> &BTreeSet<String> {
        &self.declared[id.index()]
    }
}

/// Cast a wire value against a schema with the default configuration.
///
/// Values are coerced leniently, so both `"42"` and `42` satisfy
/// `{"type": "integer"}`. Builds a fresh [`SchemaValidator`]; reuse one
/// when casting many values.
pub fn cast_and_validate(
    arena: &SchemaArena,
    id: SchemaId,
    value: &Value,
) -> Result<Decoded, Vec<SchemaError>> {
    SchemaValidator::new(arena, &ValidatorConfig::default())
        .cast(id, value, CoercionMode::Lenient, Direction::Any)
        .value
}

/// Property names declared by `root` or anything in its `allOf` closure.
pub(crate) fn declared_closure(arena: &SchemaArena, root: SchemaId) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let schema = arena.get(id);
        names.extend(schema.properties.keys().cloned());
        stack.extend(schema.all_of.iter().copied());
    }
    names
}

/// Whether `root` or an `allOf` member admits undeclared properties.
pub(crate) fn accepts_additional(arena: &SchemaArena, root: SchemaId) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let schema = arena.get(id);
        if matches!(
            schema.additional_properties,
            AdditionalProperties::Allowed | AdditionalProperties::Schema(_)
        ) {
            return true;
        }
        stack.extend(schema.all_of.iter().copied());
    }
    false
}
