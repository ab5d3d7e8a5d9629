//! Error types.
//!
//! Finder and detection failures are fatal: the message does not belong to
//! the specification (or the specification cannot handle it). Everything
//! else is a [`ValidationError`], collected per field during a pass.

use std::fmt;

use portcullis_spec::{ParameterLocation, ParameterStyle};
use thiserror::Error;

use crate::detect::MessageKind;

/// The message could not be resolved to an element of the specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindError {
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("operation not found: {method} {path}")]
    OperationNotFound { method: String, path: String },

    #[error("webhook not found: {name}")]
    WebhookNotFound { name: String },

    #[error("media type '{mimetype}' not found, declared: {}", .available.join(", "))]
    MediaTypeNotFound {
        mimetype: String,
        available: Vec<String>,
    },

    #[error("no response declared for status {status}")]
    ResponseNotFound { status: u16 },
}

/// No validator variant exists for this specification and message kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("unsupported openapi version '{0}'")]
    UnsupportedVersion(String),

    #[error("{kind} messages are not supported by openapi {version}")]
    UnsupportedMessageKind { version: String, kind: MessageKind },
}

/// A raw wire value does not fit its declared style.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeserializeError {
    #[error("cannot split '{value}' as {style} {shape}")]
    Arity {
        style: ParameterStyle,
        shape: &'static str,
        value: String,
    },

    #[error("expected '{prefix}' prefix for {style} style, got '{value}'")]
    MissingPrefix {
        style: ParameterStyle,
        prefix: String,
        value: String,
    },

    #[error("empty value is not allowed")]
    EmptyValue,

    #[error("style {style} is not supported for {location} parameters")]
    UnsupportedStyle {
        style: ParameterStyle,
        location: ParameterLocation,
    },

    #[error("invalid {media_type} content: {reason}")]
    Content { media_type: String, reason: String },
}

/// One step in a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a decoded document, from its root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// RFC 6901 rendering; the root is the empty string.
    pub fn to_pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push('/');
            match segment {
                PathSegment::Key(k) => out.push_str(&k.replace('~', "~0").replace('/', "~1")),
                PathSegment::Index(i) => out.push_str(&i.to_string()),
            }
        }
        out
    }

    fn suffix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!(" at '{}'", self.to_pointer())
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pointer())
    }
}

/// What went wrong while casting a value against a schema node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaErrorKind {
    #[error("cannot cast {found} to {expected}")]
    Cast { expected: String, found: String },

    #[error("required property '{name}' is missing")]
    RequiredPropertyMissing { name: String },

    #[error("unexpected property '{name}'")]
    UnexpectedProperty { name: String },

    #[error("invalid value: {reason}")]
    InvalidSchemaValue { reason: String },

    #[error("value matches none of the {keyword} schemas")]
    NoValidSchema { keyword: &'static str },

    #[error("value matches {count} {keyword} schemas, expected exactly one")]
    MultipleValidSchema { keyword: &'static str, count: usize },

    #[error("discriminator '{property}' value '{value}' does not name a known schema")]
    UnknownDiscriminator { property: String, value: String },

    #[error("schema nesting exceeds the depth limit of {limit}")]
    RecursionLimit { limit: usize },
}

/// A schema violation at a specific location in the value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}{}", .path.suffix())]
pub struct SchemaError {
    pub path: FieldPath,
    pub kind: SchemaErrorKind,
}

impl SchemaError {
    pub fn new(path: FieldPath, kind: SchemaErrorKind) -> Self {
        Self { path, kind }
    }
}

/// Credential extraction failed for one security scheme.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("missing api key '{name}' in {location}")]
    MissingApiKey { name: String, location: &'static str },

    #[error("missing authorization header")]
    MissingAuthorization,

    #[error("malformed authorization header")]
    MalformedAuthorization,

    #[error("authorization scheme '{found}' does not match '{expected}'")]
    SchemeMismatch { expected: String, found: String },

    #[error("security scheme '{0}' is not declared")]
    UnknownScheme(String),
}

/// A per-field problem collected during an unmarshalling pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required {location} parameter '{name}'")]
    MissingParameter {
        location: ParameterLocation,
        name: String,
    },

    #[error("{location} parameter '{name}': {error}")]
    Deserialize {
        location: ParameterLocation,
        name: String,
        #[source]
        error: DeserializeError,
    },

    #[error("{location} parameter '{name}': {error}")]
    Parameter {
        location: ParameterLocation,
        name: String,
        #[source]
        error: SchemaError,
    },

    #[error("missing required request body")]
    MissingBody,

    #[error("body: {0}")]
    BodyDeserialize(#[source] DeserializeError),

    #[error("body: {0}")]
    Body(#[source] SchemaError),

    #[error(transparent)]
    MediaType(FindError),

    #[error("no security requirement satisfied: {}", format_failures(.failures))]
    Security {
        /// Every (scheme name, failure) encountered across the alternatives.
        failures: Vec<(String, SecurityError)>,
    },
}

fn format_failures(failures: &[(String, SecurityError)]) -> String {
    failures
        .iter()
        .map(|(scheme, e)| format!("{}: {}", scheme, e))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// The schema error carried by parameter and body variants.
    pub fn schema_error(&self) -> Option<&SchemaError> {
        match self {
            Self::Parameter { error, .. } | Self::Body(error) => Some(error),
            _ => None,
        }
    }
}

/// Top-level error of a validation call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Find(#[from] FindError),

    #[error("{} validation error(s): {}", .0.len(), format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// The message does not belong to the specification (404-class).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Find(_))
    }

    /// The message belongs to the specification but violates it (400-class).
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// Collected errors of an `Invalid` error, empty otherwise.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Invalid(errors) => errors,
            _ => &[],
        }
    }
}
