//! Credential extraction for security schemes.
//!
//! Credentials are pulled out of the request verbatim. Nothing here checks
//! them; that is the caller's job.

use indexmap::IndexMap;
use portcullis_spec::{ApiKeyLocation, ApiSpec, Operation, SecurityRequirement, SecurityScheme};

use crate::error::{SecurityError, ValidationError};
use crate::message::{header_value, BaseRequest};
use crate::unmarshal::Diagnostic;

/// Extracts the credential of one security scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityProvider<'s> {
    ApiKey {
        name: &'s str,
        location: ApiKeyLocation,
    },
    Http {
        /// Lowercased, as declared.
        scheme: &'s str,
    },
    /// OAuth2, OpenID Connect and mutual TLS: acknowledged, not enforced.
    Unsupported { kind: &'static str },
}

impl<'s> SecurityProvider<'s> {
    pub fn from_scheme(scheme: &'s SecurityScheme) -> Self {
        match scheme {
            SecurityScheme::ApiKey { name, location } => Self::ApiKey {
                name: name.as_str(),
                location: *location,
            },
            SecurityScheme::Http { scheme, .. } => Self::Http {
                scheme: scheme.as_str(),
            },
            other => Self::Unsupported {
                kind: other.type_name(),
            },
        }
    }

    /// The raw credential, or `Ok(None)` for unsupported scheme types.
    pub fn extract<R: BaseRequest + ?Sized>(
        &self,
        request: &R,
    ) -> Result<Option<String>, SecurityError> {
        match *self {
            Self::ApiKey { name, location } => {
                let found = match location {
                    ApiKeyLocation::Query => lookup(request.query(), name),
                    ApiKeyLocation::Header => header_value(request.headers(), name),
                    ApiKeyLocation::Cookie => lookup(request.cookies(), name),
                };
                found
                    .map(|v| Some(v.to_string()))
                    .ok_or_else(|| SecurityError::MissingApiKey {
                        name: name.to_string(),
                        location: location.as_str(),
                    })
            }
            Self::Http { scheme } => {
                let header = header_value(request.headers(), "Authorization")
                    .ok_or(SecurityError::MissingAuthorization)?;
                let (token, credentials) = header
                    .trim()
                    .split_once(' ')
                    .ok_or(SecurityError::MalformedAuthorization)?;
                let credentials = credentials.trim();
                if token.is_empty() || credentials.is_empty() {
                    return Err(SecurityError::MalformedAuthorization);
                }
                if !token.eq_ignore_ascii_case(scheme) {
                    return Err(SecurityError::SchemeMismatch {
                        expected: scheme.to_string(),
                        found: token.to_string(),
                    });
                }
                Ok(Some(credentials.to_string()))
            }
            Self::Unsupported { .. } => Ok(None),
        }
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Outcome of resolving an operation's security requirements.
#[derive(Debug, Default)]
pub(crate) struct SecurityOutcome {
    pub credentials: Option<IndexMap<String, String>>,
    pub diagnostics: Vec<Diagnostic>,
    pub error: Option<ValidationError>,
}

/// Try each requirement in order; the first one fully satisfied wins.
///
/// Operation-level requirements replace the top-level ones. An empty
/// requirement is satisfied by any request.
pub(crate) fn resolve_security<R: BaseRequest + ?Sized>(
    spec: &ApiSpec,
    operation: &Operation,
    request: &R,
) -> SecurityOutcome {
    let requirements: &[SecurityRequirement] =
        operation.security.as_deref().unwrap_or(&spec.security);
    let mut outcome = SecurityOutcome::default();
    if requirements.is_empty() {
        return outcome;
    }

    let mut failures = Vec::new();
    for (index, requirement) in requirements.iter().enumerate() {
        let mut credentials = IndexMap::new();
        let mut satisfied = true;

        for scheme_name in requirement.schemes.keys() {
            let Some(scheme) = spec.security_scheme(scheme_name) else {
                failures.push((
                    scheme_name.clone(),
                    SecurityError::UnknownScheme(scheme_name.clone()),
                ));
                satisfied = false;
                break;
            };

            let provider = SecurityProvider::from_scheme(scheme);
            match provider.extract(request) {
                Ok(Some(credential)) => {
                    credentials.insert(scheme_name.clone(), credential);
                }
                Ok(None) => unsupported(&mut outcome.diagnostics, scheme_name, scheme),
                Err(e) => {
                    failures.push((scheme_name.clone(), e));
                    satisfied = false;
                    break;
                }
            }
        }

        if satisfied {
            tracing::debug!(
                operation = %operation.display_name(),
                requirement = index,
                "security requirement satisfied"
            );
            outcome.credentials = Some(credentials);
            return outcome;
        }
    }

    outcome.error = Some(ValidationError::Security { failures });
    outcome
}

fn unsupported(diagnostics: &mut Vec<Diagnostic>, name: &str, scheme: &SecurityScheme) {
    let diagnostic = Diagnostic::UnsupportedSecurityScheme {
        scheme: name.to_string(),
        kind: scheme.type_name(),
    };
    if diagnostics.contains(&diagnostic) {
        return;
    }
    tracing::warn!(
        scheme = %name,
        kind = scheme.type_name(),
        "security scheme type is not enforced"
    );
    diagnostics.push(diagnostic);
}
