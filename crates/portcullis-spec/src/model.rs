use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::{SchemaArena, SchemaId};

/// A loaded OpenAPI document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSpec {
    /// The raw `openapi` field (e.g. "3.1.0").
    pub openapi: String,
    /// The detected major.minor version, `None` when unsupported.
    pub version: Option<SpecVersion>,
    /// The `info.title` field.
    pub title: String,
    /// Declared servers.
    pub servers: Vec<Server>,
    /// Path operations, in declaration order.
    pub operations: Vec<Operation>,
    /// Webhook operations (3.1). `Operation::path` holds the webhook name.
    pub webhooks: Vec<Operation>,
    /// Top-level security requirements.
    pub security: Vec<SecurityRequirement>,
    /// `components.securitySchemes`.
    pub security_schemes: IndexMap<String, SecurityScheme>,
    /// Every schema node reachable from the document.
    pub schemas: SchemaArena,
}

impl ApiSpec {
    /// Path prefixes of every declared server (e.g. "/v1"), longest first.
    ///
    /// Empty when no server declares a path.
    pub fn server_base_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .servers
            .iter()
            .map(Server::base_path)
            .filter(|p| !p.is_empty())
            .collect();
        paths.sort_by_key(|p| std::cmp::Reverse(p.len()));
        paths.dedup();
        paths
    }

    /// Find a security scheme by name.
    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.security_schemes.get(name)
    }
}

/// Supported OpenAPI versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecVersion {
    /// OpenAPI 3.0.x
    V30,
    /// OpenAPI 3.1.x
    V31,
}

impl SpecVersion {
    /// Detect from the `openapi` field. Accepts "3.0", "3.0.3", "3.1", "3.1.1", ...
    pub fn detect(openapi: &str) -> Option<Self> {
        let mut parts = openapi.trim().split('.');
        match (parts.next(), parts.next()) {
            (Some("3"), Some("0")) => Some(Self::V30),
            (Some("3"), Some("1")) => Some(Self::V31),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V30 => "3.0",
            Self::V31 => "3.1",
        }
    }
}

/// A server entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    /// Variable name to default value.
    pub variables: IndexMap<String, String>,
}

impl Server {
    /// The URL's path component with variables substituted by their defaults,
    /// without a trailing slash. "/" and absent paths give "".
    pub fn base_path(&self) -> String {
        let mut url = self.url.clone();
        for (name, default) in &self.variables {
            url = url.replace(&format!("{{{}}}", name), default);
        }

        let path = match url.find("://") {
            Some(scheme_end) => {
                let rest = &url[scheme_end + 3..];
                rest.find('/').map(|i| &rest[i..]).unwrap_or("")
            }
            None => url.as_str(),
        };

        path.trim_end_matches('/').to_string()
    }
}

/// A single operation: path (or webhook name) + method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// The path template (e.g. "/users/{id}"), or the webhook name.
    pub path: String,
    /// The HTTP method (uppercase).
    pub method: String,
    pub operation_id: Option<String>,
    /// Path-level and operation-level parameters, merged.
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code, range ("2XX") or "default".
    pub responses: IndexMap<String, Response>,
    /// Operation-level security. `None` inherits the top-level requirements.
    pub security: Option<Vec<SecurityRequirement>>,
    pub deprecated: bool,
}

impl Operation {
    /// Parameters declared for one location.
    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    /// Human-readable id used in logs and errors.
    pub fn display_name(&self) -> String {
        match &self.operation_id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.method, self.path),
        }
    }
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "query" => Some(Self::Query),
            "path" => Some(Self::Path),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Form,
    Simple,
    Label,
    Matrix,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "form" => Some(Self::Form),
            "simple" => Some(Self::Simple),
            "label" => Some(Self::Label),
            "matrix" => Some(Self::Matrix),
            "spaceDelimited" => Some(Self::SpaceDelimited),
            "pipeDelimited" => Some(Self::PipeDelimited),
            "deepObject" => Some(Self::DeepObject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Simple => "simple",
            Self::Label => "label",
            Self::Matrix => "matrix",
            Self::SpaceDelimited => "spaceDelimited",
            Self::PipeDelimited => "pipeDelimited",
            Self::DeepObject => "deepObject",
        }
    }

    /// Default style for a location: form for query/cookie, simple otherwise.
    pub fn default_for(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Query | ParameterLocation::Cookie => Self::Form,
            ParameterLocation::Path | ParameterLocation::Header => Self::Simple,
        }
    }
}

impl std::fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter (or response header) definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    /// Always true for path parameters.
    pub required: bool,
    pub style: ParameterStyle,
    pub explode: bool,
    pub allow_empty_value: bool,
    pub deprecated: bool,
    pub schema: Option<SchemaId>,
    /// Single-entry `content` map (media type, definition), used instead of `schema`.
    pub content: Option<(String, MediaType)>,
}

/// A request body definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    /// Media type to definition, in declaration order.
    pub content: IndexMap<String, MediaType>,
}

/// A media type definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Option<SchemaId>,
}

/// A response definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    /// Declared headers, as header-located parameters.
    pub headers: IndexMap<String, Parameter>,
    pub content: IndexMap<String, MediaType>,
}

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Query,
    Header,
    Cookie,
}

impl ApiKeyLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// A `components.securitySchemes` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    ApiKey {
        name: String,
        location: ApiKeyLocation,
    },
    Http {
        /// Lowercased auth scheme (e.g. "bearer", "basic").
        scheme: String,
        bearer_format: Option<String>,
    },
    #[serde(rename = "oauth2")]
    OAuth2,
    OpenIdConnect {
        url: String,
    },
    MutualTls,
}

impl SecurityScheme {
    /// The OpenAPI `type` value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ApiKey { .. } => "apiKey",
            Self::Http { .. } => "http",
            Self::OAuth2 => "oauth2",
            Self::OpenIdConnect { .. } => "openIdConnect",
            Self::MutualTls => "mutualTLS",
        }
    }
}

/// One security requirement object: every listed scheme must be satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRequirement {
    /// Scheme name to required scopes.
    pub schemes: IndexMap<String, Vec<String>>,
}

impl SecurityRequirement {
    /// An empty requirement (`{}`) makes security optional.
    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}
