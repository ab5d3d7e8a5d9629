//! One-call helpers: detect the validator, build it, run it.
//!
//! Each call compiles the specification's schemas afresh. Hold on to a
//! [`RequestValidator`] or [`ResponseValidator`] when validating many
//! messages against the same specification.

use portcullis_spec::ApiSpec;

use crate::config::ValidatorConfig;
use crate::detect::{RequestValidator, ResponseValidator};
use crate::error::Error;
use crate::message::{Request, RequestMessage, Response, WebhookRequest};
use crate::unmarshal::{
    RequestUnmarshalResult, RequestUnmarshaller, ResponseUnmarshalResult, ResponseUnmarshaller,
};

pub fn unmarshal_request<'s>(
    spec: &'s ApiSpec,
    request: RequestMessage<'_>,
    config: &ValidatorConfig,
) -> Result<RequestUnmarshalResult<'s>, Error> {
    RequestValidator::for_message(spec, &request, config)?.unmarshal(request)
}

pub fn validate_request(
    spec: &ApiSpec,
    request: RequestMessage<'_>,
    config: &ValidatorConfig,
) -> Result<(), Error> {
    RequestValidator::for_message(spec, &request, config)?.validate(request)
}

pub fn unmarshal_response(
    spec: &ApiSpec,
    request: RequestMessage<'_>,
    response: &dyn Response,
    config: &ValidatorConfig,
) -> Result<ResponseUnmarshalResult, Error> {
    ResponseValidator::for_message(spec, &request, config)?.unmarshal(request, response)
}

pub fn validate_response(
    spec: &ApiSpec,
    request: RequestMessage<'_>,
    response: &dyn Response,
    config: &ValidatorConfig,
) -> Result<(), Error> {
    ResponseValidator::for_message(spec, &request, config)?.validate(request, response)
}

pub fn unmarshal_apicall_request<'s>(
    spec: &'s ApiSpec,
    request: &dyn Request,
    config: &ValidatorConfig,
) -> Result<RequestUnmarshalResult<'s>, Error> {
    unmarshal_request(spec, RequestMessage::ApiCall(request), config)
}

pub fn validate_apicall_request(
    spec: &ApiSpec,
    request: &dyn Request,
    config: &ValidatorConfig,
) -> Result<(), Error> {
    validate_request(spec, RequestMessage::ApiCall(request), config)
}

pub fn unmarshal_webhook_request<'s>(
    spec: &'s ApiSpec,
    request: &dyn WebhookRequest,
    config: &ValidatorConfig,
) -> Result<RequestUnmarshalResult<'s>, Error> {
    unmarshal_request(spec, RequestMessage::Webhook(request), config)
}

pub fn validate_webhook_request(
    spec: &ApiSpec,
    request: &dyn WebhookRequest,
    config: &ValidatorConfig,
) -> Result<(), Error> {
    validate_request(spec, RequestMessage::Webhook(request), config)
}

pub fn unmarshal_apicall_response(
    spec: &ApiSpec,
    request: &dyn Request,
    response: &dyn Response,
    config: &ValidatorConfig,
) -> Result<ResponseUnmarshalResult, Error> {
    unmarshal_response(spec, RequestMessage::ApiCall(request), response, config)
}

pub fn validate_apicall_response(
    spec: &ApiSpec,
    request: &dyn Request,
    response: &dyn Response,
    config: &ValidatorConfig,
) -> Result<(), Error> {
    validate_response(spec, RequestMessage::ApiCall(request), response, config)
}

pub fn unmarshal_webhook_response(
    spec: &ApiSpec,
    request: &dyn WebhookRequest,
    response: &dyn Response,
    config: &ValidatorConfig,
) -> Result<ResponseUnmarshalResult, Error> {
    unmarshal_response(spec, RequestMessage::Webhook(request), response, config)
}

pub fn validate_webhook_response(
    spec: &ApiSpec,
    request: &dyn WebhookRequest,
    response: &dyn Response,
    config: &ValidatorConfig,
) -> Result<(), Error> {
    validate_response(spec, RequestMessage::Webhook(request), response, config)
}
