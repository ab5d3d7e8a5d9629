//! In-memory messages for driving the validators.

use portcullis_validator::message::{parse_cookies, parse_query};
use portcullis_validator::{BaseRequest, Request, Response, WebhookRequest};
use serde_json::Value;

/// A request built up field by field.
#[derive(Debug, Clone, Default)]
pub struct TestRequest {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    content_type: Option<String>,
    body: Option<Vec<u8>>,
}

impl TestRequest {
    /// `target` may carry a query string (`/pets?limit=5`).
    pub fn new(method: &str, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: parse_query(query),
            ..Self::default()
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new("GET", target)
    }

    pub fn post(target: &str) -> Self {
        Self::new("POST", target)
    }

    pub fn query_param(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a header. A `Cookie` header also fills the cookie list.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("cookie") {
            self.cookies.extend(parse_cookies(value));
        }
        if name.eq_ignore_ascii_case("content-type") {
            self.content_type = Some(value.to_string());
        }
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// Set a JSON body and its content type.
    pub fn json(self, value: &Value) -> Self {
        self.with_body("application/json", value.to_string().into_bytes())
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.to_string());
        self.body = Some(body.into());
        self
    }

    /// A body sent without any `Content-Type`.
    pub fn untyped_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = None;
        self.body = Some(body.into());
        self
    }
}

impl BaseRequest for TestRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn query(&self) -> &[(String, String)] {
        &self.query
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

impl Request for TestRequest {
    fn path(&self) -> &str {
        &self.path
    }
}

/// A webhook delivery.
#[derive(Debug, Clone)]
pub struct TestWebhookRequest {
    name: String,
    inner: TestRequest,
}

impl TestWebhookRequest {
    pub fn new(name: &str, method: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: TestRequest::new(method, "/"),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    pub fn json(mut self, value: &Value) -> Self {
        self.inner = self.inner.json(value);
        self
    }
}

impl BaseRequest for TestWebhookRequest {
    fn method(&self) -> &str {
        self.inner.method()
    }

    fn query(&self) -> &[(String, String)] {
        self.inner.query()
    }

    fn headers(&self) -> &[(String, String)] {
        self.inner.headers()
    }

    fn cookies(&self) -> &[(String, String)] {
        self.inner.cookies()
    }

    fn content_type(&self) -> Option<&str> {
        self.inner.content_type()
    }

    fn body(&self) -> Option<&[u8]> {
        self.inner.body()
    }
}

impl WebhookRequest for TestWebhookRequest {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A response built up field by field.
#[derive(Debug, Clone, Default)]
pub struct TestResponse {
    status: u16,
    headers: Vec<(String, String)>,
    content_type: Option<String>,
    body: Option<Vec<u8>>,
}

impl TestResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(self, value: &Value) -> Self {
        self.with_body("application/json", value.to_string().into_bytes())
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.to_string());
        self.body = Some(body.into());
        self
    }
}

impl Response for TestResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_query_is_split() {
        let request = TestRequest::get("/pets?limit=5&tag=a+b");
        assert_eq!(request.path(), "/pets");
        assert_eq!(
            request.query(),
            &[
                ("limit".to_string(), "5".to_string()),
                ("tag".to_string(), "a b".to_string())
            ]
        );
    }

    #[test]
    fn cookie_header_fills_cookies() {
        let request = TestRequest::get("/").header("Cookie", "session=abc; theme=dark");
        assert_eq!(request.cookies().len(), 2);
        assert_eq!(request.headers().len(), 1);
    }
}
