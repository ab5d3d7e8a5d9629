//! Request and response validation against OpenAPI specifications.
//!
//! Resolves a message to its operation, deserializes parameters per their
//! style, casts parameters and bodies against their schemas, and extracts
//! security credentials. The result carries decoded values plus every
//! problem found; `validate_*` calls turn problems into an [`Error`].
//!
//! ```ignore
//! let spec = portcullis_spec::parse_spec_file(path)?;
//! let result = portcullis_validator::unmarshal_apicall_request(
//!     &spec,
//!     &request,
//!     &ValidatorConfig::default(),
//! )?;
//! if let Some(id) = result.parameters.path.get("petId") { /* ... */ }
//! ```

pub mod config;
pub mod deserialize;
pub mod detect;
pub mod error;
pub mod finder;
pub mod message;
pub mod problem;
pub mod schema;
pub mod security;
pub mod shortcuts;
pub mod unmarshal;

pub use config::{ErrorStrategy, ValidatorConfig};
pub use detect::{detect, detect_version, MessageKind, RequestValidator, ResponseValidator, ValidatorKind};
pub use error::{
    DeserializeError, DetectError, Error, FieldPath, FindError, PathSegment, SchemaError,
    SchemaErrorKind, SecurityError, ValidationError,
};
pub use finder::{find_media_type, find_response, OperationFinder, OperationMatch};
pub use message::{BaseRequest, Request, RequestMessage, Response, WebhookRequest};
pub use problem::ProblemDetails;
pub use schema::{cast_and_validate, CastOutcome, CoercionMode, Decoded, Direction, SchemaValidator};
pub use security::SecurityProvider;
pub use shortcuts::{
    unmarshal_apicall_request, unmarshal_apicall_response, unmarshal_request,
    unmarshal_response, unmarshal_webhook_request, unmarshal_webhook_response,
    validate_apicall_request, validate_apicall_response, validate_request, validate_response,
    validate_webhook_request, validate_webhook_response,
};
pub use unmarshal::{
    ApiCallRequestValidator, ApiCallResponseValidator, Diagnostic, Parameters,
    RequestUnmarshalResult, RequestUnmarshaller, ResponseUnmarshalResult, ResponseUnmarshaller,
    WebhookRequestValidator, WebhookResponseValidator,
};
