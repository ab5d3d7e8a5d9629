//! Validator configuration.

use serde::Deserialize;

use crate::error::ValidationError;

/// How `validate_*` calls report collected errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStrategy {
    /// Report only the first error found.
    First,
    /// Report every error found.
    #[default]
    Aggregate,
}

impl ErrorStrategy {
    /// Reduce a collected error list according to the strategy.
    pub fn apply(self, mut errors: Vec<ValidationError>) -> Vec<ValidationError> {
        if self == Self::First {
            errors.truncate(1);
        }
        errors
    }
}

/// Validator configuration.
///
/// Deserializable so a host can embed it in its own config file; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Stop at the first failing array item, object property or pass phase
    /// (default: false).
    pub fail_fast: bool,

    /// Maximum schema/value nesting depth before giving up (default: 128).
    pub max_depth: usize,

    /// Error reporting for `validate_*` calls (default: aggregate).
    pub error_strategy: ErrorStrategy,

    /// Reject undeclared properties when `additionalProperties` is absent
    /// (default: true).
    pub strict_additional_properties: bool,

    /// Decode and check string formats (default: true).
    pub validate_formats: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            max_depth: 128,
            error_strategy: ErrorStrategy::Aggregate,
            strict_additional_properties: true,
            validate_formats: true,
        }
    }
}

impl ValidatorConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set the depth limit. Zero is raised to one.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_error_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.error_strategy = strategy;
        self
    }

    pub fn with_strict_additional_properties(mut self, strict: bool) -> Self {
        self.strict_additional_properties = strict;
        self
    }

    pub fn with_validate_formats(mut self, validate: bool) -> Self {
        self.validate_formats = validate;
        self
    }
}
