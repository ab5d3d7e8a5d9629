//! Per-operation unmarshalling passes.
//!
//! A pass resolves the operation, then decodes parameters, the body and
//! security credentials in that order. Resolution failures are fatal; every
//! later problem is collected on the result and the pass carries on, unless
//! `fail_fast` is set, in which case it stops after the first failing phase.

mod request;
mod response;
mod result;

use indexmap::IndexMap;
use portcullis_spec::{ApiSpec, MediaType, Operation, Parameter, ParameterLocation, SchemaId};
use serde_json::Value;

use crate::config::ValidatorConfig;
use crate::deserialize::{deserialize_body, deserialize_parameter, MediaKind, RawParameters};
use crate::error::{Error, SchemaError, ValidationError};
use crate::finder::{find_media_type, find_response};
use crate::message::{BaseRequest, RequestMessage, Response};
use crate::schema::{CoercionMode, Decoded, Direction, SchemaValidator};
use crate::security::resolve_security;

pub use request::{ApiCallRequestValidator, WebhookRequestValidator};
pub use response::{ApiCallResponseValidator, WebhookResponseValidator};
pub use result::{Diagnostic, Parameters, RequestUnmarshalResult, ResponseUnmarshalResult};

/// Assumed when a body arrives without a `Content-Type` (RFC 9110 §8.3).
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Request headers OpenAPI says parameter definitions must not describe.
const RESERVED_HEADERS: &[&str] = &["accept", "content-type", "authorization"];

/// Common interface of the request orchestrators.
pub trait RequestUnmarshaller<'s> {
    fn config(&self) -> &ValidatorConfig;

    /// Decode everything the operation declares, collecting errors.
    fn unmarshal(&self, request: RequestMessage<'_>) -> Result<RequestUnmarshalResult<'s>, Error>;

    /// Like [`unmarshal`](Self::unmarshal), but fails on collected errors
    /// (reduced by the configured [`ErrorStrategy`](crate::ErrorStrategy)).
    fn validate(&self, request: RequestMessage<'_>) -> Result<(), Error> {
        let result = self.unmarshal(request)?;
        finish(self.config(), result.errors)
    }
}

/// Common interface of the response orchestrators.
pub trait ResponseUnmarshaller {
    fn config(&self) -> &ValidatorConfig;

    fn unmarshal(
        &self,
        request: RequestMessage<'_>,
        response: &dyn Response,
    ) -> Result<ResponseUnmarshalResult, Error>;

    fn validate(&self, request: RequestMessage<'_>, response: &dyn Response) -> Result<(), Error> {
        let result = self.unmarshal(request, response)?;
        finish(self.config(), result.errors)
    }
}

fn finish(config: &ValidatorConfig, errors: Vec<ValidationError>) -> Result<(), Error> {
    let errors = config.error_strategy.apply(errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Invalid(errors))
    }
}

/// Errors and diagnostics gathered during one pass.
#[derive(Default)]
struct Pass {
    errors: Vec<ValidationError>,
    diagnostics: Vec<Diagnostic>,
}

impl Pass {
    fn diagnose(&mut self, diagnostic: Diagnostic) {
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    fn unknown_formats(&mut self, formats: Vec<String>) {
        for format in formats {
            tracing::debug!(format = %format, "unknown string format left undecoded");
            self.diagnose(Diagnostic::UnknownFormat { format });
        }
    }
}

/// The operation-level half of every orchestrator: everything after the
/// operation has been found.
pub(crate) struct OperationUnmarshaller<'s> {
    spec: &'s ApiSpec,
    schemas: SchemaValidator<'s>,
}

impl<'s> OperationUnmarshaller<'s> {
    pub(crate) fn new(spec: &'s ApiSpec, config: &ValidatorConfig) -> Self {
        Self {
            spec,
            schemas: SchemaValidator::new(&spec.schemas, config),
        }
    }

    pub(crate) fn spec(&self) -> &'s ApiSpec {
        self.spec
    }

    pub(crate) fn config(&self) -> &ValidatorConfig {
        self.schemas.config()
    }

    fn halted(&self, pass: &Pass) -> bool {
        self.config().fail_fast && !pass.errors.is_empty()
    }

    pub(crate) fn unmarshal_request<R: BaseRequest + ?Sized>(
        &self,
        operation: &'s Operation,
        path_params: &[(String, String)],
        request: &R,
    ) -> RequestUnmarshalResult<'s> {
        let mut pass = Pass::default();

        if operation.deprecated {
            tracing::warn!(operation = %operation.display_name(), "deprecated operation called");
            pass.diagnose(Diagnostic::DeprecatedOperation {
                operation: operation.display_name(),
            });
        }

        let mut parameters = Parameters::default();
        for param in &operation.parameters {
            if self.halted(&pass) {
                break;
            }
            let raw = match param.location {
                ParameterLocation::Path => RawParameters::new(path_params),
                ParameterLocation::Query => RawParameters::new(request.query())
                    .claimed_by(sibling_names(operation, param)),
                ParameterLocation::Cookie => RawParameters::new(request.cookies())
                    .claimed_by(sibling_names(operation, param)),
                ParameterLocation::Header => {
                    if RESERVED_HEADERS
                        .iter()
                        .any(|h| param.name.eq_ignore_ascii_case(h))
                    {
                        continue;
                    }
                    RawParameters::headers(request.headers())
                }
            };
            if let Some(value) = self.parameter(param, &raw, Direction::Request, &mut pass) {
                parameters
                    .location_mut(param.location)
                    .insert(param.name.clone(), value);
            }
        }

        let body = if self.halted(&pass) {
            None
        } else {
            match &operation.request_body {
                Some(declared) => self.body(
                    &declared.content,
                    declared.required,
                    request.content_type(),
                    request.body(),
                    Direction::Request,
                    &mut pass,
                ),
                None => request
                    .body()
                    .filter(|b| !b.is_empty())
                    .map(|b| Decoded::Bytes(b.to_vec())),
            }
        };

        let mut security = None;
        if !self.halted(&pass) {
            let outcome = resolve_security(self.spec, operation, request);
            security = outcome.credentials;
            for diagnostic in outcome.diagnostics {
                pass.diagnose(diagnostic);
            }
            pass.errors.extend(outcome.error);
        }

        RequestUnmarshalResult {
            operation,
            parameters,
            body,
            security,
            errors: pass.errors,
            diagnostics: pass.diagnostics,
        }
    }

    pub(crate) fn unmarshal_response<P: Response + ?Sized>(
        &self,
        operation: &'s Operation,
        response: &P,
    ) -> Result<ResponseUnmarshalResult, Error> {
        let declared = find_response(operation, response.status())?;
        let mut pass = Pass::default();

        let mut headers = IndexMap::new();
        let raw = RawParameters::headers(response.headers());
        for (name, header) in &declared.headers {
            if self.halted(&pass) {
                break;
            }
            if name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            if let Some(value) = self.parameter(header, &raw, Direction::Response, &mut pass) {
                headers.insert(name.clone(), value);
            }
        }

        let data = if self.halted(&pass) {
            None
        } else {
            self.body(
                &declared.content,
                false,
                response.content_type(),
                response.body(),
                Direction::Response,
                &mut pass,
            )
        };

        Ok(ResponseUnmarshalResult {
            headers,
            data,
            errors: pass.errors,
            diagnostics: pass.diagnostics,
        })
    }

    fn parameter(
        &self,
        param: &Parameter,
        raw: &RawParameters<'_>,
        direction: Direction,
        pass: &mut Pass,
    ) -> Option<Decoded> {
        let location = param.location;
        let wrap = |error: SchemaError| ValidationError::Parameter {
            location,
            name: param.name.clone(),
            error,
        };

        let value = match deserialize_parameter(param, self.schemas.arena(), raw) {
            Ok(value) => value,
            Err(error) => {
                pass.errors.push(ValidationError::Deserialize {
                    location,
                    name: param.name.clone(),
                    error,
                });
                return None;
            }
        };

        let (schema, mode) = match &param.content {
            Some((media_type, media)) => (
                media.schema,
                if MediaKind::of(media_type) == MediaKind::Json {
                    CoercionMode::Strict
                } else {
                    CoercionMode::Lenient
                },
            ),
            None => (param.schema, CoercionMode::Lenient),
        };

        let Some(value) = value else {
            if param.required {
                pass.errors.push(ValidationError::MissingParameter {
                    location,
                    name: param.name.clone(),
                });
                return None;
            }
            let schema = schema?;
            let default = self.schemas.arena().get(schema).default.clone()?;
            return self.cast(schema, &default, CoercionMode::Lenient, direction, pass, wrap);
        };

        if param.deprecated {
            tracing::debug!(location = %location, name = %param.name, "deprecated parameter used");
            pass.diagnose(Diagnostic::DeprecatedParameter {
                location,
                name: param.name.clone(),
            });
        }

        match schema {
            Some(schema) => self.cast(schema, &value, mode, direction, pass, wrap),
            None => Some(Decoded::from_json(&value)),
        }
    }

    fn body(
        &self,
        content: &IndexMap<String, MediaType>,
        required: bool,
        content_type: Option<&str>,
        body: Option<&[u8]>,
        direction: Direction,
        pass: &mut Pass,
    ) -> Option<Decoded> {
        let Some(body) = body.filter(|b| !b.is_empty()) else {
            if required {
                pass.errors.push(ValidationError::MissingBody);
            }
            return None;
        };
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let kind = MediaKind::of(content_type);
        if content.is_empty() {
            return Some(raw_body(kind, body));
        }

        let media = match find_media_type(content, content_type) {
            Ok((_, media)) => media,
            Err(e) => {
                pass.errors.push(ValidationError::MediaType(e));
                return None;
            }
        };
        let Some(schema) = media.schema else {
            return Some(raw_body(kind, body));
        };
        if kind == MediaKind::Binary {
            return Some(Decoded::Bytes(body.to_vec()));
        }

        let raw = match deserialize_body(kind, content_type, body, self.schemas.arena(), Some(schema)) {
            Ok(raw) => raw,
            Err(e) => {
                pass.errors.push(ValidationError::BodyDeserialize(e));
                return None;
            }
        };
        let mode = match kind {
            MediaKind::Json => CoercionMode::Strict,
            _ => CoercionMode::Lenient,
        };
        self.cast(schema, &raw, mode, direction, pass, ValidationError::Body)
    }

    fn cast(
        &self,
        schema: SchemaId,
        value: &Value,
        mode: CoercionMode,
        direction: Direction,
        pass: &mut Pass,
        wrap: impl Fn(SchemaError) -> ValidationError,
    ) -> Option<Decoded> {
        let outcome = self.schemas.cast(schema, value, mode, direction);
        pass.unknown_formats(outcome.unknown_formats);
        match outcome.value {
            Ok(decoded) => Some(decoded),
            Err(errors) => {
                pass.errors.extend(errors.into_iter().map(wrap));
                None
            }
        }
    }
}

/// A body no schema describes: parsed JSON when it is JSON, bytes otherwise.
/// Names of the other parameters sharing `param`'s location.
fn sibling_names<'o>(operation: &'o Operation, param: &Parameter) -> impl Iterator<Item = &'o str> {
    let location = param.location;
    let name = param.name.clone();
    operation
        .parameters
        .iter()
        .filter(move |p| p.location == location && p.name != name)
        .map(|p| p.name.as_str())
}

fn raw_body(kind: MediaKind, body: &[u8]) -> Decoded {
    match kind {
        MediaKind::Json => serde_json::from_slice::<Value>(body)
            .map(|v| Decoded::from_json(&v))
            .unwrap_or_else(|_| Decoded::Bytes(body.to_vec())),
        _ => Decoded::Bytes(body.to_vec()),
    }
}
