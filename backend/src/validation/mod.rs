//! JSON Schema validation for import job definitions.
//!
//! Definitions arrive as JSON from disk, from the registry, or from an HTTP
//! upload. They are checked against an embedded JSON Schema (Draft 7) before
//! being deserialized, so a bad definition is reported with every offending
//! field at once instead of the first serde error.
//!
//! The schema is embedded at compile time from
//! `schemas/import-configuration.json`.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use profile_router::validation::validate_import_configuration;
//!
//! let config = json!({ "properties": { "mapping": { "email": 0 } } });
//! assert!(validate_import_configuration(&config).is_ok());
//!
//! let bad = json!({ "properties": { "mapping": { "email": "A" } } });
//! assert!(validate_import_configuration(&bad).is_err());
//! ```

use serde_json::Value;

const IMPORT_CONFIGURATION_SCHEMA: &str = include_str!("../../schemas/import-configuration.json");

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every error otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Boolean shortcut for [`validate`].
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

fn import_configuration_schema() -> Result<Value, Vec<String>> {
    serde_json::from_str(IMPORT_CONFIGURATION_SCHEMA)
        .map_err(|e| vec![format!("Invalid embedded schema: {}", e)])
}

/// Validate an import job definition.
pub fn validate_import_configuration(data: &Value) -> Result<(), Vec<String>> {
    let schema = import_configuration_schema()?;
    validate(&schema, data)
}

/// Quick check of an import job definition.
pub fn is_valid_import_configuration(data: &Value) -> bool {
    import_configuration_schema()
        .map(|schema| is_valid(&schema, data))
        .unwrap_or(false)
}
