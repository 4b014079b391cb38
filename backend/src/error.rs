//! Error types for the profile import pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`TokenizeError`] - Lines that do not split into one record
//! - [`RecordError`] - Per-line rejections produced by the line transformer
//! - [`ConfigError`] - Invalid or unreadable import configurations
//! - [`SchemaError`] - Property type provider failures
//! - [`RegistryError`] - Stored configuration registry errors
//! - [`SinkError`] - Failures while handing envelopes to a sink
//! - [`ImportError`] - Top-level import job errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Tokenizer Errors
// =============================================================================

/// A line that cannot be split into exactly one record.
#[derive(Debug, Error)]
pub enum TokenizeError {
    /// The CSV reader failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The text holds more than one record.
    #[error("line contains a record terminator")]
    TrailingRecord,

    /// A quoted field is never closed.
    #[error("unterminated quoted field")]
    UnterminatedQuote,
}

// =============================================================================
// Record Errors
// =============================================================================

/// Machine-readable kind of a rejected record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    EmptyLine,
    #[serde(rename = "MAPPING_COLUMN_MATCH")]
    MappingColumnMismatch,
    #[serde(rename = "DATA_TYPE")]
    DataTypeMismatch,
    SchemaResolution,
    MalformedLine,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::EmptyLine => "EMPTY_LINE",
            FailureKind::MappingColumnMismatch => "MAPPING_COLUMN_MATCH",
            FailureKind::DataTypeMismatch => "DATA_TYPE",
            FailureKind::SchemaResolution => "SCHEMA_RESOLUTION",
            FailureKind::MalformedLine => "MALFORMED_LINE",
        }
    }

    /// Configuration faults mean the job definition itself is stale.
    pub fn is_config_fault(&self) -> bool {
        matches!(self, FailureKind::SchemaResolution)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that could not be turned into a profile update.
///
/// Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record has no usable first field.
    #[error("Empty line : line [{line}]")]
    EmptyLine { line: usize },

    /// The mapping needs more columns than the line has once the delete column is reserved.
    #[error("The mapping does not match the number of column : line [{line}]")]
    MappingColumnMismatch { line: usize },

    /// A value could not be coerced to its declared type.
    #[error("Unable to convert '{value}' to {expected} for '{field}' : line [{line}]")]
    DataTypeMismatch {
        line: usize,
        field: String,
        value: String,
        expected: String,
    },

    /// A mapped field has no property type in the schema.
    #[error("Unknown property type '{field}' : line [{line}]")]
    SchemaResolutionFailure { line: usize, field: String },

    /// The line does not tokenize into exactly one record.
    #[error("Malformed line ({message}) : line [{line}]")]
    MalformedLine { line: usize, message: String },
}

impl RecordError {
    pub fn line(&self) -> usize {
        match self {
            RecordError::EmptyLine { line }
            | RecordError::MappingColumnMismatch { line }
            | RecordError::DataTypeMismatch { line, .. }
            | RecordError::SchemaResolutionFailure { line, .. }
            | RecordError::MalformedLine { line, .. } => *line,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            RecordError::EmptyLine { .. } => FailureKind::EmptyLine,
            RecordError::MappingColumnMismatch { .. } => FailureKind::MappingColumnMismatch,
            RecordError::DataTypeMismatch { .. } => FailureKind::DataTypeMismatch,
            RecordError::SchemaResolutionFailure { .. } => FailureKind::SchemaResolution,
            RecordError::MalformedLine { .. } => FailureKind::MalformedLine,
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading or checking an import configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value the pipeline cannot work with.
    #[error("Invalid import configuration: {0}")]
    Invalid(String),

    /// The JSON definition does not match the embedded schema.
    #[error("Import configuration failed schema validation: {errors:?}")]
    SchemaViolation { errors: Vec<String> },

    /// Failed to read the definition.
    #[error("Failed to read import configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("Import configuration JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors from a property type provider.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A definition file could not be parsed.
    #[error("Invalid property type definition in {path}: {message}")]
    InvalidDefinition { path: String, message: String },

    /// IO error while reading definitions.
    #[error("Property type IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the stored configuration registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Configuration not found.
    #[error("Import configuration not found: {0}")]
    NotFound(String),

    /// The stored definition is not usable.
    #[error("Invalid import configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors while emitting envelopes.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Sink serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Top-level import job errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_import`].
/// A rejected record only surfaces here when the job runs with
/// [`crate::transform::pipeline::ErrorPolicy::Abort`].
#[derive(Debug, Error)]
pub enum ImportError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Property type provider error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Sink error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Record rejected.
    #[error("Record rejected: {0}")]
    Record(#[from] RecordError),

    /// Input could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Import error.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Stored configuration lookup failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Listener failure.
    #[error("Server IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for a single record.
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for import jobs.
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // RecordError -> ImportError
        let record_err = RecordError::EmptyLine { line: 4 };
        let import_err: ImportError = record_err.into();
        assert!(import_err.to_string().contains("line [4]"));

        // ConfigError -> ImportError -> ServerError
        let config_err = ConfigError::Invalid("columnSeparator".into());
        let server_err: ServerError = ImportError::from(config_err).into();
        assert!(server_err.to_string().contains("columnSeparator"));
    }

    #[test]
    fn test_data_type_message_format() {
        let err = RecordError::DataTypeMismatch {
            line: 3,
            field: "optIn".into(),
            value: "maybe".into(),
            expected: "boolean".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'maybe'"));
        assert!(msg.contains("boolean"));
        assert!(msg.contains("line [3]"));
        assert_eq!(err.line(), 3);
        assert_eq!(err.kind(), FailureKind::DataTypeMismatch);
    }

    #[test]
    fn test_failure_kind_codes() {
        assert_eq!(FailureKind::EmptyLine.as_str(), "EMPTY_LINE");
        assert_eq!(
            serde_json::to_value(FailureKind::MappingColumnMismatch).unwrap(),
            "MAPPING_COLUMN_MATCH"
        );
        assert_eq!(serde_json::to_value(FailureKind::DataTypeMismatch).unwrap(), "DATA_TYPE");
        assert_eq!(
            serde_json::to_value(FailureKind::SchemaResolution).unwrap(),
            "SCHEMA_RESOLUTION"
        );
        assert!(FailureKind::SchemaResolution.is_config_fault());
        assert!(!FailureKind::DataTypeMismatch.is_config_fault());
    }
}
