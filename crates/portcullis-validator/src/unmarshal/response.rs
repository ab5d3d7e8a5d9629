use portcullis_spec::ApiSpec;

use super::request::wrong_kind;
use super::{OperationUnmarshaller, ResponseUnmarshalResult, ResponseUnmarshaller};
use crate::config::ValidatorConfig;
use crate::detect::MessageKind;
use crate::error::Error;
use crate::finder::OperationFinder;
use crate::message::{Request, RequestMessage, Response, WebhookRequest};

/// Validates responses to path operations.
pub struct ApiCallResponseValidator<'s> {
    finder: OperationFinder<'s>,
    core: OperationUnmarshaller<'s>,
}

impl<'s> ApiCallResponseValidator<'s> {
    pub fn new(spec: &'s ApiSpec, config: &ValidatorConfig) -> Self {
        Self {
            finder: OperationFinder::new(spec),
            core: OperationUnmarshaller::new(spec, config),
        }
    }

    /// `request` is only used to find the operation.
    pub fn unmarshal_response<R: Request + ?Sized, P: Response + ?Sized>(
        &self,
        request: &R,
        response: &P,
    ) -> Result<ResponseUnmarshalResult, Error> {
        let found = self.finder.find(request.method(), request.path())?;
        self.core.unmarshal_response(found.operation, response)
    }
}

impl ResponseUnmarshaller for ApiCallResponseValidator<'_> {
    fn config(&self) -> &ValidatorConfig {
        self.core.config()
    }

    fn unmarshal(
        &self,
        request: RequestMessage<'_>,
        response: &dyn Response,
    ) -> Result<ResponseUnmarshalResult, Error> {
        match request {
            RequestMessage::ApiCall(r) => self.unmarshal_response(r, response),
            RequestMessage::Webhook(_) => {
                Err(wrong_kind(self.core.spec(), MessageKind::WebhookResponse))
            }
        }
    }
}

/// Validates responses returned by webhook receivers.
pub struct WebhookResponseValidator<'s> {
    finder: OperationFinder<'s>,
    core: OperationUnmarshaller<'s>,
}

impl<'s> WebhookResponseValidator<'s> {
    pub fn new(spec: &'s ApiSpec, config: &ValidatorConfig) -> Self {
        Self {
            finder: OperationFinder::new(spec),
            core: OperationUnmarshaller::new(spec, config),
        }
    }

    pub fn unmarshal_response<R: WebhookRequest + ?Sized, P: Response + ?Sized>(
        &self,
        request: &R,
        response: &P,
    ) -> Result<ResponseUnmarshalResult, Error> {
        let operation = self.finder.find_webhook(request.name(), request.method())?;
        self.core.unmarshal_response(operation, response)
    }
}

impl ResponseUnmarshaller for WebhookResponseValidator<'_> {
    fn config(&self) -> &ValidatorConfig {
        self.core.config()
    }

    fn unmarshal(
        &self,
        request: RequestMessage<'_>,
        response: &dyn Response,
    ) -> Result<ResponseUnmarshalResult, Error> {
        match request {
            RequestMessage::Webhook(r) => self.unmarshal_response(r, response),
            RequestMessage::ApiCall(_) => {
                Err(wrong_kind(self.core.spec(), MessageKind::ApiCallResponse))
            }
        }
    }
}
