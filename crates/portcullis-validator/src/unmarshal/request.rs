use portcullis_spec::ApiSpec;

use super::{OperationUnmarshaller, RequestUnmarshalResult, RequestUnmarshaller};
use crate::config::ValidatorConfig;
use crate::detect::MessageKind;
use crate::error::{DetectError, Error};
use crate::finder::OperationFinder;
use crate::message::{Request, RequestMessage, WebhookRequest};

/// Validates requests addressed to path operations.
pub struct ApiCallRequestValidator<'s> {
    finder: OperationFinder<'s>,
    core: OperationUnmarshaller<'s>,
}

impl<'s> ApiCallRequestValidator<'s> {
    pub fn new(spec: &'s ApiSpec, config: &ValidatorConfig) -> Self {
        Self {
            finder: OperationFinder::new(spec),
            core: OperationUnmarshaller::new(spec, config),
        }
    }

    pub fn unmarshal_request<R: Request + ?Sized>(
        &self,
        request: &R,
    ) -> Result<RequestUnmarshalResult<'s>, Error> {
        let found = self.finder.find(request.method(), request.path())?;
        Ok(self
            .core
            .unmarshal_request(found.operation, &found.path_params, request))
    }
}

impl<'s> RequestUnmarshaller<'s> for ApiCallRequestValidator<'s> {
    fn config(&self) -> &ValidatorConfig {
        self.core.config()
    }

    fn unmarshal(&self, request: RequestMessage<'_>) -> Result<RequestUnmarshalResult<'s>, Error> {
        match request {
            RequestMessage::ApiCall(r) => self.unmarshal_request(r),
            RequestMessage::Webhook(_) => Err(wrong_kind(self.core.spec(), MessageKind::WebhookRequest)),
        }
    }
}

/// Validates requests delivered to webhooks.
pub struct WebhookRequestValidator<'s> {
    finder: OperationFinder<'s>,
    core: OperationUnmarshaller<'s>,
}

impl<'s> WebhookRequestValidator<'s> {
    pub fn new(spec: &'s ApiSpec, config: &ValidatorConfig) -> Self {
        Self {
            finder: OperationFinder::new(spec),
            core: OperationUnmarshaller::new(spec, config),
        }
    }

    pub fn unmarshal_request<R: WebhookRequest + ?Sized>(
        &self,
        request: &R,
    ) -> Result<RequestUnmarshalResult<'s>, Error> {
        let operation = self.finder.find_webhook(request.name(), request.method())?;
        Ok(self.core.unmarshal_request(operation, &[], request))
    }
}

impl<'s> RequestUnmarshaller<'s> for WebhookRequestValidator<'s> {
    fn config(&self) -> &ValidatorConfig {
        self.core.config()
    }

    fn unmarshal(&self, request: RequestMessage<'_>) -> Result<RequestUnmarshalResult<'s>, Error> {
        match request {
            RequestMessage::Webhook(r) => self.unmarshal_request(r),
            RequestMessage::ApiCall(_) => Err(wrong_kind(self.core.spec(), MessageKind::ApiCallRequest)),
        }
    }
}

pub(super) fn wrong_kind(spec: &ApiSpec, kind: MessageKind) -> Error {
    Error::Detect(DetectError::UnsupportedMessageKind {
        version: spec.openapi.clone(),
        kind,
    })
}
