use std::borrow::Cow;
use std::path::PathBuf;

use thiserror::Error;

use crate::value::FieldKind;

/// Top-level error type returned by docsift operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A value failed coercion or a field constraint.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A field or schema could not be resolved.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A query builder was reused after execution.
    #[error(transparent)]
    QueryState(#[from] QueryStateError),

    /// Malformed pagination or operator arguments.
    #[error(transparent)]
    QueryArgument(#[from] QueryArgumentError),

    /// The search backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Index configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Collection of validation issues encountered while coercing or validating values.
#[derive(Debug, Clone, Error)]
#[error("validation failed: {}", describe_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns true when any issue carries the given code.
    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

fn describe_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors raised while building schemas or resolving field names against them.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown field '{field}' on document type '{schema}'")]
    UnknownField { schema: String, field: String },

    #[error("no schema registered under the name '{name}'")]
    UnknownSchema { name: String },

    #[error("schema name '{name}' is already taken by another document type")]
    DuplicateSchema { name: String },

    #[error("invalid field name '{name}': {reason}")]
    InvalidFieldName { name: String, reason: &'static str },

    #[error("invalid default for field '{field}'")]
    InvalidDefault {
        field: String,
        #[source]
        source: ValidationError,
    },

    #[error("invalid option on field '{field}': {message}")]
    InvalidOption { field: String, message: String },

    #[error("field '{field}' holds a {actual} value, not {expected}")]
    KindMismatch {
        field: String,
        expected: FieldKind,
        actual: &'static str,
    },

    #[error("document belongs to '{actual}', expected '{expected}'")]
    SchemaMismatch { expected: String, actual: String },
}

impl SchemaError {
    pub(crate) fn unknown_field(schema: &str, field: &str) -> Self {
        Self::UnknownField {
            schema: schema.to_string(),
            field: field.to_string(),
        }
    }
}

/// A query builder method was called after the builder had been executed.
#[derive(Debug, Clone, Error)]
#[error("query has already been executed; `{operation}` is not allowed on a spent query")]
pub struct QueryStateError {
    pub operation: &'static str,
}

/// Invalid arguments supplied to a query builder method.
#[derive(Debug, Clone, Error)]
#[error("invalid query argument: {message}")]
pub struct QueryArgumentError {
    pub message: String,
}

impl QueryArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Failures reported by (or while talking to) the search backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The backend answered with something this layer could not interpret.
    #[error("unexpected backend response: {message}")]
    Response { message: Cow<'static, str> },

    /// The backend does not support the requested operation.
    #[error("unsupported by backend: {message}")]
    Unsupported { message: Cow<'static, str> },

    /// The backend reported a failure for the request.
    #[error("backend request failed: {message}")]
    Failed { message: Cow<'static, str> },
}

impl BackendError {
    pub(crate) fn response(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Response {
            message: message.into(),
        }
    }
}

/// Errors raised while loading an [`IndexConfig`](crate::config::IndexConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var} is not set")]
    MissingEnv { var: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_issue() {
        let err = ValidationError::new([
            ValidationIssue::new("rating", "out_of_range", "7 is above the maximum 5"),
            ValidationIssue::new("year", "invalid_type", "expected an integer"),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("rating: 7 is above the maximum 5"));
        assert!(rendered.contains("year: expected an integer"));
        assert!(err.has_code("out_of_range"));
        assert!(!err.has_code("missing"));
    }

    #[test]
    fn search_error_converts_from_categories() {
        let err: SearchError = QueryStateError { operation: "filter" }.into();
        assert!(matches!(err, SearchError::QueryState(QueryStateError { operation: "filter" })));

        let err: SearchError = SchemaError::unknown_field("film", "budget").into();
        assert!(err.to_string().contains("unknown field 'budget' on document type 'film'"));
    }
}
