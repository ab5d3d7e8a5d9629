use indexmap::IndexMap;
use portcullis_spec::{Operation, ParameterLocation};

use crate::error::{Error, ValidationError};
use crate::schema::Decoded;

/// Decoded parameters, by location then name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    pub path: IndexMap<String, Decoded>,
    pub query: IndexMap<String, Decoded>,
    pub header: IndexMap<String, Decoded>,
    pub cookie: IndexMap<String, Decoded>,
}

impl Parameters {
    pub fn location(&self, location: ParameterLocation) -> &IndexMap<String, Decoded> {
        match location {
            ParameterLocation::Path => &self.path,
            ParameterLocation::Query => &self.query,
            ParameterLocation::Header => &self.header,
            ParameterLocation::Cookie => &self.cookie,
        }
    }

    pub(crate) fn location_mut(
        &mut self,
        location: ParameterLocation,
    ) -> &mut IndexMap<String, Decoded> {
        match location {
            ParameterLocation::Path => &mut self.path,
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.header,
            ParameterLocation::Cookie => &mut self.cookie,
        }
    }

    pub fn get(&self, location: ParameterLocation, name: &str) -> Option<&Decoded> {
        self.location(location).get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
            && self.query.is_empty()
            && self.header.is_empty()
            && self.cookie.is_empty()
    }
}

/// A non-fatal finding reported alongside a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The scheme's type is acknowledged but its credentials are not extracted.
    UnsupportedSecurityScheme { scheme: String, kind: &'static str },
    DeprecatedOperation { operation: String },
    DeprecatedParameter {
        location: ParameterLocation,
        name: String,
    },
    /// A string `format` no decoder or checker recognises.
    UnknownFormat { format: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedSecurityScheme { scheme, kind } => {
                write!(f, "security scheme '{}' of type {} is not enforced", scheme, kind)
            }
            Self::DeprecatedOperation { operation } => {
                write!(f, "operation '{}' is deprecated", operation)
            }
            Self::DeprecatedParameter { location, name } => {
                write!(f, "{} parameter '{}' is deprecated", location, name)
            }
            Self::UnknownFormat { format } => write!(f, "unknown format '{}'", format),
        }
    }
}

/// Everything decoded from a request, plus the problems found on the way.
///
/// A result with errors is partial: fields that failed are absent.
#[derive(Debug, Clone)]
pub struct RequestUnmarshalResult<'s> {
    pub operation: &'s Operation,
    pub parameters: Parameters,
    /// The decoded body; raw bytes when no schema describes it.
    pub body: Option<Decoded>,
    /// Credentials of the satisfied security requirement, by scheme name.
    /// `None` when the operation has no security requirements.
    pub security: Option<IndexMap<String, String>>,
    pub errors: Vec<ValidationError>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'s> RequestUnmarshalResult<'s> {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Err(Error::Invalid)` when any error was collected.
    pub fn into_result(self) -> Result<Self, Error> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(Error::Invalid(self.errors))
        }
    }
}

/// Everything decoded from a response.
#[derive(Debug, Clone, Default)]
pub struct ResponseUnmarshalResult {
    pub headers: IndexMap<String, Decoded>,
    pub data: Option<Decoded>,
    pub errors: Vec<ValidationError>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResponseUnmarshalResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Self, Error> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(Error::Invalid(self.errors))
        }
    }
}
