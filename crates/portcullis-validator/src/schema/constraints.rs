//! Per-node constraint keywords, compiled once with `jsonschema`.

use jsonschema::Draft;
use portcullis_spec::{SchemaArena, SchemaId};
use serde_json::Value;

/// Compiled constraint validators, indexed by schema id.
pub(crate) struct CompiledConstraints {
    validators: Vec<Option<jsonschema::Validator>>,
}

impl CompiledConstraints {
    /// Compile the leftover keywords of every node that has any.
    ///
    /// A node whose keywords fail to compile (e.g. a bad `pattern`) is logged
    /// and left unconstrained.
    pub(crate) fn compile(arena: &SchemaArena, validate_formats: bool) -> Self {
        let validators = arena
            .iter()
            .map(|(id, schema)| {
                let mut keywords = schema.constraints.clone();
                if !validate_formats {
                    keywords.remove("format");
                }
                if keywords.is_empty() {
                    return None;
                }
                compile_keywords(id, &Value::Object(keywords))
            })
            .collect();
        Self { validators }
    }

    /// Every constraint violation for `value` at node `id`.
    pub(crate) fn violations(&self, id: SchemaId, value: &Value) -> Vec<String> {
        match self.validators.get(id.index()).and_then(Option::as_ref) {
            Some(validator) => validator.iter_errors(value).map(|e| e.to_string()).collect(),
            None => Vec::new(),
        }
    }
}

fn compile_keywords(id: SchemaId, keywords: &Value) -> Option<jsonschema::Validator> {
    match jsonschema::options()
        .with_draft(Draft::Draft202012)
        .should_validate_formats(true)
        .build(keywords)
    {
        Ok(validator) => Some(validator),
        Err(e) => {
            tracing::warn!(
                schema = id.index(),
                error = %e,
                "ignoring constraints that failed to compile"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_spec::SpecVersion;
    use serde_json::json;

    fn compiled(schema: Value, formats: bool) -> (CompiledConstraints, SchemaId) {
        let (arena, id) = SchemaArena::from_standalone(&schema, SpecVersion::V31).unwrap();
        (CompiledConstraints::compile(&arena, formats), id)
    }

    #[test]
    fn reports_range_violations() {
        let (c, id) = compiled(json!({ "type": "integer", "minimum": 1, "maximum": 10 }), true);
        assert!(c.violations(id, &json!(5)).is_empty());
        assert_eq!(c.violations(id, &json!(11)).len(), 1);
    }

    #[test]
    fn exclusive_bounds_from_3_0() {
        let schema = json!({ "type": "number", "minimum": 0, "exclusiveMinimum": true });
        let (arena, id) = SchemaArena::from_standalone(&schema, SpecVersion::V30).unwrap();
        let c = CompiledConstraints::compile(&arena, true);
        assert_eq!(c.violations(id, &json!(0)).len(), 1);
        assert!(c.violations(id, &json!(0.5)).is_empty());
    }

    #[test]
    fn format_checks_can_be_disabled() {
        let schema = json!({ "type": "string", "format": "email" });
        let (on, id) = compiled(schema.clone(), true);
        assert_eq!(on.violations(id, &json!("nope")).len(), 1);

        let (off, id) = compiled(schema, false);
        assert!(off.violations(id, &json!("nope")).is_empty());
    }

    #[test]
    fn bad_pattern_is_ignored() {
        let (c, id) = compiled(json!({ "type": "string", "pattern": "([" }), true);
        assert!(c.violations(id, &json!("anything")).is_empty());
    }
}
