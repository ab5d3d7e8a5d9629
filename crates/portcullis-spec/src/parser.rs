use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{
    ApiKeyLocation, ApiSpec, MediaType, Operation, Parameter, ParameterLocation, ParameterStyle,
    RequestBody, Response, SecurityRequirement, SecurityScheme, Server, SpecVersion,
};
use crate::schema::SchemaLoader;

/// HTTP methods we recognize in path items.
const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Resolve a JSON Reference like `#/components/schemas/User` from the spec root.
///
/// Only local references (`#/...`) are supported. Returns `None` for external refs.
pub(crate) fn resolve_ref<'a>(root: &'a Value, ref_path: &str) -> Option<&'a Value> {
    let pointer = ref_path.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    // `Value::pointer` handles `~0`/`~1` unescaping.
    root.pointer(pointer)
}

/// Follow a chain of `$ref`s on a non-schema object (parameter, response, ...).
///
/// `visited` tracks the chain to detect circular references.
fn deref<'a>(value: &'a Value, root: &'a Value) -> Result<&'a Value, ParseError> {
    let mut visited = HashSet::new();
    let mut current = value;
    while let Some(ref_str) = current.get("$ref").and_then(|v| v.as_str()) {
        if !visited.insert(ref_str.to_string()) {
            return Err(ParseError::Schema(format!(
                "circular $ref detected: {}",
                ref_str
            )));
        }
        current =
            resolve_ref(root, ref_str).ok_or_else(|| ParseError::UnresolvedRef(ref_str.to_string()))?;
    }
    Ok(current)
}

/// Parse an OpenAPI spec from a YAML/JSON string.
pub fn parse_spec(input: &str) -> Result<ApiSpec, ParseError> {
    // Parse YAML (also handles JSON since JSON is valid YAML)
    let root: Value =
        serde_yaml::from_str(input).map_err(|e| ParseError::Parse(e.to_string()))?;
    ApiSpec::from_value(&root)
}

/// Parse a spec from a file path.
pub fn parse_spec_file(path: &std::path::Path) -> Result<ApiSpec, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_spec(&content)
}

impl ApiSpec {
    /// Build the model from an already-parsed document.
    pub fn from_value(root: &Value) -> Result<Self, ParseError> {
        let root_obj = root
            .as_object()
            .ok_or_else(|| ParseError::Parse("spec root must be an object".into()))?;

        let openapi = detect_version(root_obj)?;
        let version = SpecVersion::detect(&openapi);

        let title = root_obj
            .get("info")
            .and_then(|v| v.get("title"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        // Schema details that differ between 3.0 and 3.1 follow 3.1 when unknown.
        let mut loader = SchemaLoader::new(root, version.unwrap_or(SpecVersion::V31));
        loader.load_components()?;

        let servers = parse_servers(root_obj);

        let mut operations = Vec::new();
        if let Some(paths) = root_obj.get("paths").and_then(|v| v.as_object()) {
            for (path, item) in paths {
                operations.extend(parse_path_item(path, item, root, &mut loader)?);
            }
        }

        let mut webhooks = Vec::new();
        if let Some(hooks) = root_obj.get("webhooks").and_then(|v| v.as_object()) {
            for (name, item) in hooks {
                webhooks.extend(parse_path_item(name, item, root, &mut loader)?);
            }
        }

        let security = match root_obj.get("security") {
            Some(v) => parse_security_requirements(v)?,
            None => Vec::new(),
        };

        let security_schemes = parse_security_schemes(root)?;

        Ok(ApiSpec {
            openapi,
            version,
            title,
            servers,
            operations,
            webhooks,
            security,
            security_schemes,
            schemas: loader.finish(),
        })
    }
}

/// Extract the `openapi` field.
fn detect_version(root: &Map<String, Value>) -> Result<String, ParseError> {
    match root.get("openapi") {
        Some(Value::String(v)) => Ok(v.clone()),
        // YAML `openapi: 3.1` parses as a number.
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ParseError::Schema(format!(
            "'openapi' must be a string, got {}",
            other
        ))),
        None => Err(ParseError::UnknownFormat),
    }
}

fn parse_servers(root: &Map<String, Value>) -> Vec<Server> {
    root.get("servers")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| {
                    let url = s.get("url")?.as_str()?.to_string();
                    let variables = s
                        .get("variables")
                        .and_then(|v| v.as_object())
                        .map(|vars| {
                            vars.iter()
                                .filter_map(|(name, var)| {
                                    let default = var.get("default")?.as_str()?;
                                    Some((name.clone(), default.to_string()))
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(Server { url, variables })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse one path item (or webhook item) into its operations.
fn parse_path_item(
    path: &str,
    item: &Value,
    root: &Value,
    loader: &mut SchemaLoader<'_>,
) -> Result<Vec<Operation>, ParseError> {
    let item = deref(item, root)?;
    let path_obj = item.as_object().ok_or_else(|| {
        ParseError::Schema(format!("path item for '{}' must be an object", path))
    })?;

    // Path-level parameters (inherited by all operations)
    let path_params = parse_parameters(path_obj, root, loader)?;

    let mut operations = Vec::new();
    for method in HTTP_METHODS {
        let Some(op_value) = path_obj.get(*method) else {
            continue;
        };
        let op_obj = op_value.as_object().ok_or_else(|| {
            ParseError::Schema(format!(
                "operation {} {} must be an object",
                method.to_uppercase(),
                path
            ))
        })?;

        // Operation-level parameters override path-level ones with the same (name, in).
        let mut params = path_params.clone();
        for param in parse_parameters(op_obj, root, loader)? {
            match params
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => params.push(param),
            }
        }

        let request_body = match op_obj.get("requestBody") {
            Some(body) => Some(parse_request_body(body, root, loader)?),
            None => None,
        };

        let responses = match op_obj.get("responses").and_then(|v| v.as_object()) {
            Some(responses) => parse_responses(responses, root, loader)?,
            None => IndexMap::new(),
        };

        let security = match op_obj.get("security") {
            Some(v) => Some(parse_security_requirements(v)?),
            None => None,
        };

        operations.push(Operation {
            path: path.to_string(),
            method: method.to_uppercase(),
            operation_id: op_obj
                .get("operationId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            parameters: params,
            request_body,
            responses,
            security,
            deprecated: op_obj
                .get("deprecated")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        });
    }

    Ok(operations)
}

/// Parse the `parameters` array of a path item or operation object.
fn parse_parameters(
    obj: &Map<String, Value>,
    root: &Value,
    loader: &mut SchemaLoader<'_>,
) -> Result<Vec<Parameter>, ParseError> {
    let Some(arr) = obj.get("parameters").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };

    let mut params = Vec::with_capacity(arr.len());
    for item in arr {
        let param = deref(item, root)?;
        let param_obj = param
            .as_object()
            .ok_or_else(|| ParseError::Schema("parameter must be an object".into()))?;

        let name = param_obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParseError::Schema("parameter missing 'name'".into()))?;
        let location = param_obj
            .get("in")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParseError::Schema(format!("parameter '{}' missing 'in'", name)))?;
        let location = ParameterLocation::parse(location).ok_or_else(|| {
            ParseError::Schema(format!(
                "parameter '{}' has unsupported location '{}'",
                name, location
            ))
        })?;

        params.push(parse_parameter(name, location, param_obj, loader)?);
    }
    Ok(params)
}

/// Parse a parameter or header object. Headers pass `ParameterLocation::Header`.
fn parse_parameter(
    name: &str,
    location: ParameterLocation,
    obj: &Map<String, Value>,
    loader: &mut SchemaLoader<'_>,
) -> Result<Parameter, ParseError> {
    let style = match obj.get("style").and_then(|v| v.as_str()) {
        Some(s) => ParameterStyle::parse(s).ok_or_else(|| {
            ParseError::Schema(format!("parameter '{}' has unknown style '{}'", name, s))
        })?,
        None => ParameterStyle::default_for(location),
    };

    let explode = obj
        .get("explode")
        .and_then(|v| v.as_bool())
        .unwrap_or(style == ParameterStyle::Form);

    let schema = match obj.get("schema") {
        Some(s) => Some(loader.load(s)?),
        None => None,
    };

    // `content` holds exactly one media type entry.
    let content = match obj.get("content").and_then(|v| v.as_object()) {
        Some(content) => match content.iter().next() {
            Some((media_type, media_obj)) => {
                Some((media_type.clone(), parse_media_type(media_obj, loader)?))
            }
            None => None,
        },
        None => None,
    };

    Ok(Parameter {
        name: name.to_string(),
        location,
        required: location == ParameterLocation::Path
            || obj.get("required").and_then(|v| v.as_bool()).unwrap_or(false),
        style,
        explode,
        allow_empty_value: obj
            .get("allowEmptyValue")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        deprecated: obj
            .get("deprecated")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        schema,
        content,
    })
}

fn parse_media_type(value: &Value, loader: &mut SchemaLoader<'_>) -> Result<MediaType, ParseError> {
    let schema = match value.get("schema") {
        Some(s) => Some(loader.load(s)?),
        None => None,
    };
    Ok(MediaType { schema })
}

fn parse_content(
    obj: &Map<String, Value>,
    loader: &mut SchemaLoader<'_>,
) -> Result<IndexMap<String, MediaType>, ParseError> {
    let mut content = IndexMap::new();
    if let Some(content_obj) = obj.get("content").and_then(|v| v.as_object()) {
        for (media_type, media_obj) in content_obj {
            content.insert(media_type.clone(), parse_media_type(media_obj, loader)?);
        }
    }
    Ok(content)
}

fn parse_request_body(
    body: &Value,
    root: &Value,
    loader: &mut SchemaLoader<'_>,
) -> Result<RequestBody, ParseError> {
    let body = deref(body, root)?;
    let body_obj = body
        .as_object()
        .ok_or_else(|| ParseError::Schema("requestBody must be an object".into()))?;

    Ok(RequestBody {
        required: body_obj
            .get("required")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        content: parse_content(body_obj, loader)?,
    })
}

fn parse_responses(
    responses: &Map<String, Value>,
    root: &Value,
    loader: &mut SchemaLoader<'_>,
) -> Result<IndexMap<String, Response>, ParseError> {
    let mut parsed = IndexMap::new();
    for (status, response) in responses {
        let response = deref(response, root)?;
        let resp_obj = response.as_object().ok_or_else(|| {
            ParseError::Schema(format!("response '{}' must be an object", status))
        })?;

        let mut headers = IndexMap::new();
        if let Some(header_map) = resp_obj.get("headers").and_then(|v| v.as_object()) {
            for (name, header) in header_map {
                let header = deref(header, root)?;
                let header_obj = header.as_object().ok_or_else(|| {
                    ParseError::Schema(format!("header '{}' must be an object", name))
                })?;
                headers.insert(
                    name.clone(),
                    parse_parameter(name, ParameterLocation::Header, header_obj, loader)?,
                );
            }
        }

        parsed.insert(
            // Range keys are matched as "2XX".
            status.to_uppercase(),
            Response {
                description: resp_obj
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                headers,
                content: parse_content(resp_obj, loader)?,
            },
        );
    }
    Ok(parsed)
}

fn parse_security_requirements(value: &Value) -> Result<Vec<SecurityRequirement>, ParseError> {
    let arr = value
        .as_array()
        .ok_or_else(|| ParseError::Schema("'security' must be an array".into()))?;

    arr.iter()
        .map(|req| {
            let req_obj = req.as_object().ok_or_else(|| {
                ParseError::Schema("security requirement must be an object".into())
            })?;
            let schemes = req_obj
                .iter()
                .map(|(name, scopes)| {
                    let scopes = scopes
                        .as_array()
                        .map(|s| {
                            s.iter()
                                .filter_map(|v| v.as_str().map(String::from))
                                .collect()
                        })
                        .unwrap_or_default();
                    (name.clone(), scopes)
                })
                .collect();
            Ok(SecurityRequirement { schemes })
        })
        .collect()
}

fn parse_security_schemes(root: &Value) -> Result<IndexMap<String, SecurityScheme>, ParseError> {
    let mut schemes = IndexMap::new();
    let Some(defs) = root
        .pointer("/components/securitySchemes")
        .and_then(|v| v.as_object())
    else {
        return Ok(schemes);
    };

    for (name, def) in defs {
        let def = deref(def, root)?;
        let field = |key: &str| def.get(key).and_then(|v| v.as_str());

        let scheme = match field("type") {
            Some("apiKey") => {
                let key_name = field("name").ok_or_else(|| {
                    ParseError::Schema(format!("apiKey scheme '{}' missing 'name'", name))
                })?;
                let location = match field("in") {
                    Some("query") => ApiKeyLocation::Query,
                    Some("header") => ApiKeyLocation::Header,
                    Some("cookie") => ApiKeyLocation::Cookie,
                    other => {
                        return Err(ParseError::Schema(format!(
                            "apiKey scheme '{}' has invalid 'in': {:?}",
                            name, other
                        )))
                    }
                };
                SecurityScheme::ApiKey {
                    name: key_name.to_string(),
                    location,
                }
            }
            Some("http") => SecurityScheme::Http {
                scheme: field("scheme")
                    .ok_or_else(|| {
                        ParseError::Schema(format!("http scheme '{}' missing 'scheme'", name))
                    })?
                    .to_lowercase(),
                bearer_format: field("bearerFormat").map(String::from),
            },
            Some("oauth2") => SecurityScheme::OAuth2,
            Some("openIdConnect") => SecurityScheme::OpenIdConnect {
                url: field("openIdConnectUrl").unwrap_or_default().to_string(),
            },
            Some("mutualTLS") => SecurityScheme::MutualTls,
            other => {
                return Err(ParseError::Schema(format!(
                    "security scheme '{}' has unknown type {:?}",
                    name, other
                )))
            }
        };
        schemes.insert(name.clone(), scheme);
    }

    Ok(schemes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaType;

    const PETSTORE: &str = r##"
openapi: "3.0.3"
info:
  title: Petstore
  version: "1.0"
servers:
  - url: https://petstore.example.com/v1
paths:
  /pets:
    parameters:
      - name: limit
        in: query
        schema: { type: integer }
    get:
      operationId: listPets
      parameters:
        - name: limit
          in: query
          required: true
          schema: { type: integer, maximum: 100 }
        - name: tags
          in: query
          explode: false
          schema: { type: array, items: { type: string } }
      responses:
        "200":
          description: ok
          headers:
            X-Rate-Limit:
              schema: { type: integer }
          content:
            application/json:
              schema:
                type: array
                items: { $ref: "#/components/schemas/Pet" }
    post:
      requestBody:
        $ref: "#/components/requestBodies/PetBody"
      responses:
        default:
          description: error
  /pets/{petId}:
    get:
      parameters:
        - $ref: "#/components/parameters/PetId"
      security:
        - bearerAuth: []
      responses:
        2xx:
          description: ok
components:
  parameters:
    PetId:
      name: petId
      in: path
      schema: { type: string }
  requestBodies:
    PetBody:
      required: true
      content:
        application/json:
          schema: { $ref: "#/components/schemas/Pet" }
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name: { type: string }
        tag: { type: string, nullable: true }
  securitySchemes:
    apiKey:
      type: apiKey
      name: api_key
      in: header
    bearerAuth:
      type: http
      scheme: Bearer
    oauth:
      type: oauth2
      flows: {}
security:
  - apiKey: []
"##;

    #[test]
    fn parse_petstore() {
        let spec = parse_spec(PETSTORE).unwrap();
        assert_eq!(spec.version, Some(SpecVersion::V30));
        assert_eq!(spec.title, "Petstore");
        assert_eq!(spec.operations.len(), 3);
        assert_eq!(spec.server_base_paths(), vec!["/v1".to_string()]);

        let list = &spec.operations[0];
        assert_eq!(list.method, "GET");
        assert_eq!(list.operation_id.as_deref(), Some("listPets"));
        // Operation-level `limit` replaced the path-level one.
        assert_eq!(list.parameters.len(), 2);
        assert!(list.parameters[0].required);
        let tags = &list.parameters[1];
        assert_eq!(tags.style, ParameterStyle::Form);
        assert!(!tags.explode);

        let ok = &list.responses["200"];
        assert!(ok.headers.contains_key("X-Rate-Limit"));
        assert!(ok.content.contains_key("application/json"));
    }

    #[test]
    fn request_body_ref_and_schema_ref_resolve() {
        let spec = parse_spec(PETSTORE).unwrap();
        let create = &spec.operations[1];
        let body = create.request_body.as_ref().unwrap();
        assert!(body.required);
        let schema_id = body.content["application/json"].schema.unwrap();
        assert_eq!(Some(schema_id), spec.schemas.component("Pet"));

        let pet = spec.schemas.get(schema_id);
        assert_eq!(pet.types, vec![SchemaType::Object]);
        assert!(spec.schemas.get(pet.properties["tag"]).nullable);
    }

    #[test]
    fn path_parameter_always_required() {
        let spec = parse_spec(PETSTORE).unwrap();
        let get = &spec.operations[2];
        let pet_id = &get.parameters[0];
        assert_eq!(pet_id.location, ParameterLocation::Path);
        assert!(pet_id.required);
        assert_eq!(pet_id.style, ParameterStyle::Simple);
        assert!(!pet_id.explode);
        assert!(get.responses.contains_key("2XX"));
    }

    #[test]
    fn security_parsed() {
        let spec = parse_spec(PETSTORE).unwrap();
        assert_eq!(spec.security.len(), 1);
        assert!(matches!(
            spec.security_scheme("apiKey"),
            Some(SecurityScheme::ApiKey { location: ApiKeyLocation::Header, .. })
        ));
        match spec.security_scheme("bearerAuth") {
            Some(SecurityScheme::Http { scheme, .. }) => assert_eq!(scheme, "bearer"),
            other => panic!("unexpected scheme: {:?}", other),
        }
        assert!(matches!(spec.security_scheme("oauth"), Some(SecurityScheme::OAuth2)));
        assert!(spec.operations[2].security.is_some());
    }

    #[test]
    fn missing_openapi_field_is_unknown_format() {
        let err = parse_spec("info: { title: x }").unwrap_err();
        assert!(matches!(err, ParseError::UnknownFormat));
    }

    #[test]
    fn unsupported_version_still_loads() {
        let spec = parse_spec("openapi: 2.0\ninfo: { title: x }").unwrap();
        assert_eq!(spec.version, None);
    }

    #[test]
    fn webhooks_parsed() {
        let spec = parse_spec(
            r#"
openapi: 3.1.0
info: { title: hooks, version: "1" }
webhooks:
  newPet:
    post:
      requestBody:
        content:
          application/json:
            schema: { type: object }
      responses:
        "200": { description: ok }
"#,
        )
        .unwrap();
        assert_eq!(spec.version, Some(SpecVersion::V31));
        assert_eq!(spec.webhooks.len(), 1);
        assert_eq!(spec.webhooks[0].path, "newPet");
        assert_eq!(spec.webhooks[0].method, "POST");
    }

    #[test]
    fn circular_parameter_ref_rejected() {
        let err = parse_spec(
            r##"
openapi: 3.1.0
paths:
  /a:
    get:
      parameters:
        - $ref: "#/components/parameters/A"
components:
  parameters:
    A: { $ref: "#/components/parameters/B" }
    B: { $ref: "#/components/parameters/A" }
"##,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Schema(_)));
    }

    #[test]
    fn circular_schema_alias_rejected() {
        let err = parse_spec(
            r##"
openapi: 3.1.0
paths: {}
components:
  schemas:
    A: { $ref: "#/components/schemas/B" }
    B: { $ref: "#/components/schemas/A" }
"##,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Schema(msg) if msg.contains("circular")));
    }
}
