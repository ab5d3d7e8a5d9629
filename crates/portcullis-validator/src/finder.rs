//! Resolving a message to its operation, media type and response.

use indexmap::IndexMap;
use portcullis_router::{RouteEntry, RouteMatch, Router};
use portcullis_spec::{ApiSpec, MediaType, Operation, Response};

use crate::error::FindError;

/// A resolved path operation and the path parameters captured for it.
#[derive(Debug, Clone)]
pub struct OperationMatch<'s> {
    pub operation: &'s Operation,
    /// Captured (name, percent-decoded value) pairs, in path order.
    pub path_params: Vec<(String, String)>,
}

/// Maps request paths and webhook names to operations.
pub struct OperationFinder<'s> {
    spec: &'s ApiSpec,
    router: Router,
    base_paths: Vec<String>,
}

impl<'s> OperationFinder<'s> {
    pub fn new(spec: &'s ApiSpec) -> Self {
        let mut router = Router::new();
        for (index, op) in spec.operations.iter().enumerate() {
            if !router.insert(&op.path, &op.method, RouteEntry::new(index, &op.path)) {
                tracing::debug!(
                    method = %op.method,
                    path = %op.path,
                    "operation shadowed by an earlier template"
                );
            }
        }
        Self {
            spec,
            router,
            base_paths: spec.server_base_paths(),
        }
    }

    /// Find the operation for `method` and a concrete request `path`.
    ///
    /// The path is tried with each server base path stripped, then as-is.
    pub fn find(&self, method: &str, path: &str) -> Result<OperationMatch<'s>, FindError> {
        let path = path.split('?').next().unwrap_or(path);
        let mut method_mismatch = false;

        for candidate in self.candidates(path) {
            match self.router.lookup(&candidate, method) {
                RouteMatch::Found { entry, params } => {
                    let operation = &self.spec.operations[entry.operation_index];
                    tracing::debug!(
                        method = %method,
                        path = %path,
                        operation = %operation.display_name(),
                        "resolved operation"
                    );
                    return Ok(OperationMatch {
                        operation,
                        path_params: params,
                    });
                }
                RouteMatch::MethodNotAllowed { .. } => method_mismatch = true,
                RouteMatch::NotFound => {}
            }
        }

        if method_mismatch {
            Err(FindError::OperationNotFound {
                method: method.to_ascii_uppercase(),
                path: path.to_string(),
            })
        } else {
            Err(FindError::PathNotFound {
                path: path.to_string(),
            })
        }
    }

    fn candidates(&self, path: &str) -> Vec<String> {
        let mut candidates: Vec<String> = self
            .base_paths
            .iter()
            .filter_map(|base| {
                let rest = path.strip_prefix(base.as_str())?;
                match rest {
                    "" => Some("/".to_string()),
                    r if r.starts_with('/') => Some(r.to_string()),
                    _ => None,
                }
            })
            .collect();
        candidates.push(path.to_string());
        candidates
    }

    /// Find a webhook operation by name and method.
    pub fn find_webhook(&self, name: &str, method: &str) -> Result<&'s Operation, FindError> {
        let mut named = self.spec.webhooks.iter().filter(|w| w.path == name).peekable();
        if named.peek().is_none() {
            return Err(FindError::WebhookNotFound {
                name: name.to_string(),
            });
        }
        let found = named
            .find(|w| w.method.eq_ignore_ascii_case(method))
            .ok_or_else(|| FindError::OperationNotFound {
                method: method.to_ascii_uppercase(),
                path: name.to_string(),
            })?;
        tracing::debug!(webhook = %name, method = %method, "resolved webhook");
        Ok(found)
    }
}

/// Pick the declared media type for a message's `Content-Type`.
///
/// Parameters are ignored and matching is case-insensitive. An exact match
/// beats `type/*`, which beats `*/*`.
pub fn find_media_type<'c>(
    content: &'c IndexMap<String, MediaType>,
    content_type: &str,
) -> Result<(&'c str, &'c MediaType), FindError> {
    let wanted = essence(content_type);
    let major = wanted.split('/').next().unwrap_or_default();
    let range = format!("{}/*", major);

    let lookup = |target: &str| {
        content
            .iter()
            .find(|(declared, _)| essence(declared) == target)
            .map(|(declared, media)| (declared.as_str(), media))
    };

    let found = lookup(&wanted)
        .or_else(|| lookup(&range))
        .or_else(|| lookup("*/*"))
        .ok_or_else(|| FindError::MediaTypeNotFound {
            mimetype: content_type.to_string(),
            available: content.keys().cloned().collect(),
        })?;
    tracing::debug!(content_type = %content_type, media_type = %found.0, "selected media type");
    Ok(found)
}

fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Pick the declared response for a status: exact, then `NXX`, then `default`.
pub fn find_response(operation: &Operation, status: u16) -> Result<&Response, FindError> {
    let keyed = |key: &str| {
        operation
            .responses
            .iter()
            .find(|(declared, _)| declared.eq_ignore_ascii_case(key))
            .map(|(_, response)| response)
    };
    keyed(&status.to_string())
        .or_else(|| keyed(&format!("{}XX", status / 100)))
        .or_else(|| keyed("default"))
        .ok_or(FindError::ResponseNotFound { status })
}
