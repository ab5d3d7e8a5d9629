use thiserror::Error;

/// Errors produced while loading a specification document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document has no `openapi` root field.
    #[error("not an OpenAPI document (missing 'openapi' field)")]
    UnknownFormat,

    /// YAML/JSON parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Unresolved local `$ref`.
    #[error("unresolved $ref: {0}")]
    UnresolvedRef(String),

    /// Structurally invalid document.
    #[error("schema error: {0}")]
    Schema(String),

    /// I/O error reading the spec file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
