//! Message abstraction.
//!
//! Transports implement these traits for their own request/response types.
//! Values are expected already read and percent-decoded; repeated query
//! parameters and headers appear as repeated pairs.

use portcullis_router::percent_decode;

/// Accessors shared by API-call and webhook requests.
pub trait BaseRequest {
    /// HTTP method, any case.
    fn method(&self) -> &str;

    /// Decoded query pairs, in wire order.
    fn query(&self) -> &[(String, String)];

    /// Header pairs. Names are matched case-insensitively.
    fn headers(&self) -> &[(String, String)];

    /// Cookie pairs.
    fn cookies(&self) -> &[(String, String)];

    /// The `Content-Type` of the body, if any.
    fn content_type(&self) -> Option<&str>;

    /// Body bytes, `None` when the request carries no body.
    fn body(&self) -> Option<&[u8]>;
}

/// A request addressed to a path operation.
pub trait Request: BaseRequest {
    /// The request path, without query string.
    fn path(&self) -> &str;
}

/// A request delivered to a webhook.
pub trait WebhookRequest: BaseRequest {
    /// The webhook name used to look up the operation.
    fn name(&self) -> &str;
}

/// A response to either kind of request.
pub trait Response {
    fn status(&self) -> u16;

    fn headers(&self) -> &[(String, String)];

    fn content_type(&self) -> Option<&str>;

    fn body(&self) -> Option<&[u8]>;
}

/// A request of either kind, as accepted by the dispatch layer.
#[derive(Clone, Copy)]
pub enum RequestMessage<'a> {
    ApiCall(&'a dyn Request),
    Webhook(&'a dyn WebhookRequest),
}

impl<'a> RequestMessage<'a> {
    pub fn method(&self) -> &str {
        match self {
            Self::ApiCall(r) => r.method(),
            Self::Webhook(r) => r.method(),
        }
    }

    /// Path for API calls, webhook name for webhooks.
    pub fn target(&self) -> &str {
        match self {
            Self::ApiCall(r) => r.path(),
            Self::Webhook(r) => r.name(),
        }
    }
}

impl std::fmt::Debug for RequestMessage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiCall(_) => write!(f, "ApiCall({} {})", self.method(), self.target()),
            Self::Webhook(_) => write!(f, "Webhook({} {})", self.method(), self.target()),
        }
    }
}

/// Case-insensitive lookup of every value for a header name.
pub fn header_values<'a>(headers: &'a [(String, String)], name: &str) -> Vec<&'a str> {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
        .collect()
}

/// Case-insensitive lookup of the first value for a header name.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Split a raw query string into decoded pairs.
///
/// `+` decodes to a space; a key without `=` gets an empty value.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key, true), percent_decode(value, true))
        })
        .collect()
}

/// Split a `Cookie` header into pairs.
pub fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
