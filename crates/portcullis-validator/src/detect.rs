//! Picking the orchestrator for a specification and a message.
//!
//! Dispatch goes through one static table keyed by specification version
//! and message kind. A pair missing from the table is unsupported.

use portcullis_spec::{ApiSpec, SpecVersion};

use crate::config::ValidatorConfig;
use crate::error::{DetectError, Error};
use crate::message::{RequestMessage, Response};
use crate::unmarshal::{
    ApiCallRequestValidator, ApiCallResponseValidator, RequestUnmarshalResult,
    RequestUnmarshaller, ResponseUnmarshalResult, ResponseUnmarshaller, WebhookRequestValidator,
    WebhookResponseValidator,
};

/// What a message is, as far as dispatch is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ApiCallRequest,
    WebhookRequest,
    ApiCallResponse,
    WebhookResponse,
}

impl MessageKind {
    pub fn of_request(request: &RequestMessage<'_>) -> Self {
        match request {
            RequestMessage::ApiCall(_) => Self::ApiCallRequest,
            RequestMessage::Webhook(_) => Self::WebhookRequest,
        }
    }

    /// The kind of a response answering `request`.
    pub fn of_response(request: &RequestMessage<'_>) -> Self {
        match request {
            RequestMessage::ApiCall(_) => Self::ApiCallResponse,
            RequestMessage::Webhook(_) => Self::WebhookResponse,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiCallRequest => "api call request",
            Self::WebhookRequest => "webhook request",
            Self::ApiCallResponse => "api call response",
            Self::WebhookResponse => "webhook response",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete orchestrator variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorKind {
    V30ApiCallRequest,
    V30ApiCallResponse,
    V31ApiCallRequest,
    V31ApiCallResponse,
    V31WebhookRequest,
    V31WebhookResponse,
}

const DISPATCH: &[((SpecVersion, MessageKind), ValidatorKind)] = &[
    (
        (SpecVersion::V30, MessageKind::ApiCallRequest),
        ValidatorKind::V30ApiCallRequest,
    ),
    (
        (SpecVersion::V30, MessageKind::ApiCallResponse),
        ValidatorKind::V30ApiCallResponse,
    ),
    (
        (SpecVersion::V31, MessageKind::ApiCallRequest),
        ValidatorKind::V31ApiCallRequest,
    ),
    (
        (SpecVersion::V31, MessageKind::ApiCallResponse),
        ValidatorKind::V31ApiCallResponse,
    ),
    (
        (SpecVersion::V31, MessageKind::WebhookRequest),
        ValidatorKind::V31WebhookRequest,
    ),
    (
        (SpecVersion::V31, MessageKind::WebhookResponse),
        ValidatorKind::V31WebhookResponse,
    ),
];

impl ValidatorKind {
    pub fn version(&self) -> SpecVersion {
        self.entry().0
    }

    pub fn message_kind(&self) -> MessageKind {
        self.entry().1
    }

    fn entry(&self) -> (SpecVersion, MessageKind) {
        match self {
            Self::V30ApiCallRequest => (SpecVersion::V30, MessageKind::ApiCallRequest),
            Self::V30ApiCallResponse => (SpecVersion::V30, MessageKind::ApiCallResponse),
            Self::V31ApiCallRequest => (SpecVersion::V31, MessageKind::ApiCallRequest),
            Self::V31ApiCallResponse => (SpecVersion::V31, MessageKind::ApiCallResponse),
            Self::V31WebhookRequest => (SpecVersion::V31, MessageKind::WebhookRequest),
            Self::V31WebhookResponse => (SpecVersion::V31, MessageKind::WebhookResponse),
        }
    }
}

/// The supported version a specification declares.
pub fn detect_version(spec: &ApiSpec) -> Result<SpecVersion, DetectError> {
    spec.version
        .ok_or_else(|| DetectError::UnsupportedVersion(spec.openapi.clone()))
}

/// Look up the orchestrator variant for a specification and message kind.
pub fn detect(spec: &ApiSpec, kind: MessageKind) -> Result<ValidatorKind, DetectError> {
    let version = detect_version(spec)?;
    DISPATCH
        .iter()
        .find(|(key, _)| *key == (version, kind))
        .map(|(_, validator)| *validator)
        .ok_or_else(|| DetectError::UnsupportedMessageKind {
            version: spec.openapi.clone(),
            kind,
        })
}

/// A request orchestrator of either kind.
pub enum RequestValidator<'s> {
    ApiCall(ApiCallRequestValidator<'s>),
    Webhook(WebhookRequestValidator<'s>),
}

impl<'s> RequestValidator<'s> {
    /// Build the orchestrator for requests of `kind`.
    pub fn for_kind(
        spec: &'s ApiSpec,
        kind: MessageKind,
        config: &ValidatorConfig,
    ) -> Result<Self, DetectError> {
        let validator = match detect(spec, kind)? {
            ValidatorKind::V30ApiCallRequest | ValidatorKind::V31ApiCallRequest => {
                Self::ApiCall(ApiCallRequestValidator::new(spec, config))
            }
            ValidatorKind::V31WebhookRequest => {
                Self::Webhook(WebhookRequestValidator::new(spec, config))
            }
            other => {
                return Err(DetectError::UnsupportedMessageKind {
                    version: spec.openapi.clone(),
                    kind: other.message_kind(),
                })
            }
        };
        tracing::debug!(kind = %kind, version = %spec.openapi, "selected request validator");
        Ok(validator)
    }

    /// Build the orchestrator matching `request`.
    pub fn for_message(
        spec: &'s ApiSpec,
        request: &RequestMessage<'_>,
        config: &ValidatorConfig,
    ) -> Result<Self, DetectError> {
        Self::for_kind(spec, MessageKind::of_request(request), config)
    }
}

impl<'s> RequestUnmarshaller<'s> for RequestValidator<'s> {
    fn config(&self) -> &ValidatorConfig {
        match self {
            Self::ApiCall(v) => v.config(),
            Self::Webhook(v) => v.config(),
        }
    }

    fn unmarshal(&self, request: RequestMessage<'_>) -> Result<RequestUnmarshalResult<'s>, Error> {
        match self {
            Self::ApiCall(v) => v.unmarshal(request),
            Self::Webhook(v) => v.unmarshal(request),
        }
    }
}

/// A response orchestrator of either kind.
pub enum ResponseValidator<'s> {
    ApiCall(ApiCallResponseValidator<'s>),
    Webhook(WebhookResponseValidator<'s>),
}

impl<'s> ResponseValidator<'s> {
    pub fn for_kind(
        spec: &'s ApiSpec,
        kind: MessageKind,
        config: &ValidatorConfig,
    ) -> Result<Self, DetectError> {
        let validator = match detect(spec, kind)? {
            ValidatorKind::V30ApiCallResponse | ValidatorKind::V31ApiCallResponse => {
                Self::ApiCall(ApiCallResponseValidator::new(spec, config))
            }
            ValidatorKind::V31WebhookResponse => {
                Self::Webhook(WebhookResponseValidator::new(spec, config))
            }
            other => {
                return Err(DetectError::UnsupportedMessageKind {
                    version: spec.openapi.clone(),
                    kind: other.message_kind(),
                })
            }
        };
        tracing::debug!(kind = %kind, version = %spec.openapi, "selected response validator");
        Ok(validator)
    }

    /// Build the orchestrator for responses answering `request`.
    pub fn for_message(
        spec: &'s ApiSpec,
        request: &RequestMessage<'_>,
        config: &ValidatorConfig,
    ) -> Result<Self, DetectError> {
        Self::for_kind(spec, MessageKind::of_response(request), config)
    }
}

impl ResponseUnmarshaller for ResponseValidator<'_> {
    fn config(&self) -> &ValidatorConfig {
        match self {
            Self::ApiCall(v) => v.config(),
            Self::Webhook(v) => v.config(),
        }
    }

    fn unmarshal(
        &self,
        request: RequestMessage<'_>,
        response: &dyn Response,
    ) -> Result<ResponseUnmarshalResult, Error> {
        match self {
            Self::ApiCall(v) => v.unmarshal(request, response),
            Self::Webhook(v) => v.unmarshal(request, response),
        }
    }
}
