//! RFC 9457 problem details for validation failures.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, FindError, ValidationError};

/// RFC 9457 Problem Details.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Extended fields for dev mode
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl ProblemDetails {
    /// Map an error onto a problem: 404 when the message does not belong to
    /// the specification, 400 when it is invalid, 500 when no validator
    /// exists for it.
    pub fn from_error(error: &Error, dev_mode: bool) -> Self {
        match error {
            Error::Find(find) => Self::not_found(find),
            Error::Invalid(errors) => Self::validation_error(errors, dev_mode),
            Error::Detect(detect) => ProblemDetails {
                error_type: "urn:portcullis:error:unsupported-specification".into(),
                title: "Specification cannot validate this message".into(),
                status: 500,
                detail: Some(detect.to_string()),
                instance: None,
                extensions: HashMap::new(),
            },
        }
    }

    fn not_found(error: &FindError) -> Self {
        let (suffix, title) = match error {
            FindError::PathNotFound { .. } | FindError::WebhookNotFound { .. } => {
                ("route-not-found", "No matching route")
            }
            FindError::OperationNotFound { .. } => ("method-not-allowed", "No matching operation"),
            FindError::MediaTypeNotFound { .. } => ("media-type-not-found", "Unsupported media type"),
            FindError::ResponseNotFound { .. } => ("response-not-found", "Undeclared response"),
        };
        ProblemDetails {
            error_type: format!("urn:portcullis:error:{}", suffix),
            title: title.into(),
            status: 404,
            detail: Some(error.to_string()),
            instance: None,
            extensions: HashMap::new(),
        }
    }

    pub fn validation_error(errors: &[ValidationError], dev_mode: bool) -> Self {
        let mut extensions = HashMap::new();

        if dev_mode && !errors.is_empty() {
            let error_details: Vec<Value> = errors.iter().map(error_detail).collect();
            extensions.insert("errors".into(), Value::Array(error_details));
        }

        let detail = if errors.len() == 1 {
            Some(errors[0].to_string())
        } else {
            Some(format!("{} validation errors", errors.len()))
        };

        ProblemDetails {
            error_type: "urn:portcullis:error:validation-failed".into(),
            title: "Message validation failed".into(),
            status: 400,
            detail,
            instance: None,
            extensions,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"urn:portcullis:error:internal","title":"Serialization error","status":500}"#.into()
        })
    }
}

fn error_detail(error: &ValidationError) -> Value {
    let mut detail = Map::new();
    let mut put = |key: &str, value: String| {
        detail.insert(key.into(), Value::String(value));
    };

    match error {
        ValidationError::MissingParameter { location, name } => {
            put("field", name.clone());
            put("location", location.to_string());
            put("reason", "missing required parameter".into());
        }
        ValidationError::Deserialize {
            location,
            name,
            error,
        } => {
            put("field", name.clone());
            put("location", location.to_string());
            put("reason", error.to_string());
        }
        ValidationError::Parameter {
            location,
            name,
            error,
        } => {
            put("field", name.clone());
            put("location", location.to_string());
            if !error.path.is_root() {
                put("pointer", error.path.to_pointer());
            }
            put("reason", error.kind.to_string());
        }
        ValidationError::MissingBody => {
            put("field", "body".into());
            put("reason", "missing required request body".into());
        }
        ValidationError::BodyDeserialize(error) => {
            put("field", "body".into());
            put("reason", error.to_string());
        }
        ValidationError::Body(error) => {
            put("field", "body".into());
            put("pointer", error.path.to_pointer());
            put("reason", error.kind.to_string());
        }
        ValidationError::MediaType(error) => {
            put("field", "content-type".into());
            put("reason", error.to_string());
        }
        ValidationError::Security { .. } => {
            put("field", "security".into());
            put("reason", error.to_string());
        }
    }
    Value::Object(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FieldPath, SchemaError, SchemaErrorKind};
    use portcullis_spec::ParameterLocation;

    #[test]
    fn invalid_is_400_with_dev_details() {
        let errors = vec![
            ValidationError::MissingParameter {
                location: ParameterLocation::Query,
                name: "limit".into(),
            },
            ValidationError::Body(SchemaError::new(
                FieldPath::root().key("age"),
                SchemaErrorKind::Cast {
                    expected: "integer".into(),
                    found: "string".into(),
                },
            )),
        ];

        let problem = ProblemDetails::from_error(&Error::Invalid(errors.clone()), false);
        assert_eq!(problem.status, 400);
        assert_eq!(problem.error_type, "urn:portcullis:error:validation-failed");
        assert_eq!(problem.detail.as_deref(), Some("2 validation errors"));
        assert!(problem.extensions.is_empty());

        let problem = ProblemDetails::from_error(&Error::Invalid(errors), true);
        let json: Value = serde_json::from_str(&problem.to_json()).unwrap();
        assert_eq!(json["errors"][0]["field"], "limit");
        assert_eq!(json["errors"][0]["location"], "query");
        assert_eq!(json["errors"][1]["pointer"], "/age");
    }

    #[test]
    fn not_found_is_404() {
        let problem = ProblemDetails::from_error(
            &Error::Find(FindError::PathNotFound {
                path: "/nope".into(),
            }),
            true,
        );
        assert_eq!(problem.status, 404);
        assert_eq!(problem.error_type, "urn:portcullis:error:route-not-found");
        assert_eq!(problem.detail.as_deref(), Some("path not found: /nope"));
    }

    #[test]
    fn instance_is_serialized_when_set() {
        let problem = ProblemDetails::validation_error(&[ValidationError::MissingBody], false)
            .with_instance("/pets");
        let json: Value = serde_json::from_str(&problem.to_json()).unwrap();
        assert_eq!(json["instance"], "/pets");
        assert_eq!(json["detail"], "missing required request body");
    }
}
