//! Import job configuration.
//!
//! An [`ImportConfiguration`] is resolved once per job and shared read-only by
//! every line transformation of that job.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::validate_import_configuration;

/// Kind of import job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    #[default]
    Oneshot,
    Recurrent,
}

/// How produced profiles are routed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// No routing metadata.
    #[default]
    Direct,
    /// Partition-aware transport; every record of a job goes to one partition.
    Partitioned,
}

/// Free-form job properties. Only the column mapping is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportProperties {
    /// Property id -> zero-based column index.
    pub mapping: BTreeMap<String, usize>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Configuration of one import job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfiguration {
    #[serde(default = "generate_item_id")]
    pub item_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub config_type: ConfigType,

    pub properties: ImportProperties,

    /// Properties that may be overwritten when merging into an existing profile.
    #[serde(default)]
    pub properties_to_overwrite: Vec<String>,

    /// Property used to find an existing profile to merge into.
    #[serde(default)]
    pub merging_property: Option<String>,

    #[serde(default)]
    pub overwrite_existing_profiles: bool,

    #[serde(default = "default_column_separator")]
    pub column_separator: char,

    /// First line of the file is a header row.
    #[serde(default)]
    pub has_header: bool,

    /// Last column of each line is a "delete this profile" flag.
    #[serde(default)]
    pub has_delete_column: bool,

    #[serde(default = "default_multi_value_separator")]
    pub multi_value_separator: String,

    /// Bracket pair around multivalued cells, e.g. `[]`.
    #[serde(default)]
    pub multi_value_delimiter: Option<String>,

    #[serde(default)]
    pub sink_kind: SinkKind,
}

fn generate_item_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_column_separator() -> char {
    ','
}

fn default_multi_value_separator() -> String {
    ";".to_string()
}

impl ImportConfiguration {
    /// Create a configuration with default options for the given mapping.
    pub fn new(mapping: BTreeMap<String, usize>) -> Self {
        Self {
            item_id: generate_item_id(),
            name: String::new(),
            description: String::new(),
            config_type: ConfigType::default(),
            properties: ImportProperties {
                mapping,
                extra: BTreeMap::new(),
            },
            properties_to_overwrite: Vec::new(),
            merging_property: None,
            overwrite_existing_profiles: false,
            column_separator: default_column_separator(),
            has_header: false,
            has_delete_column: false,
            multi_value_separator: default_multi_value_separator(),
            multi_value_delimiter: None,
            sink_kind: SinkKind::default(),
        }
    }

    /// Build a configuration from `(property, column)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, usize)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(field, column)| (field.to_string(), column))
                .collect(),
        )
    }

    /// Parse and schema-check a JSON definition.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Schema-check a JSON value, deserialize it, then validate the options.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        validate_import_configuration(value)
            .map_err(|errors| ConfigError::SchemaViolation { errors })?;
        let config: ImportConfiguration = serde_json::from_value(value.clone())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON definition from disk.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn mapping(&self) -> &BTreeMap<String, usize> {
        &self.properties.mapping
    }

    /// Check the options a line transformer depends on.
    pub fn validate(&self) -> ConfigResult<()> {
        self.separator_byte()?;
        if self.multi_value_separator.is_empty() {
            return Err(ConfigError::Invalid(
                "multiValueSeparator must not be empty".to_string(),
            ));
        }
        if self.properties.mapping.is_empty() {
            return Err(ConfigError::Invalid(
                "properties.mapping must map at least one property".to_string(),
            ));
        }
        Ok(())
    }

    /// The column separator as the byte the CSV tokenizer expects.
    pub fn separator_byte(&self) -> ConfigResult<u8> {
        match self.column_separator {
            '"' => Err(ConfigError::Invalid(
                "columnSeparator cannot be the quote character".to_string(),
            )),
            c if c.is_ascii() => Ok(c as u8),
            c => Err(ConfigError::Invalid(format!(
                "columnSeparator '{}' is not a single ASCII character",
                c
            ))),
        }
    }

    /// The bracket pair to strip from multivalued cells, when one is configured.
    ///
    /// Only a non-blank, exactly two character delimiter enables stripping.
    pub fn delimiter_pair(&self) -> Option<(char, char)> {
        let delimiter = self.multi_value_delimiter.as_deref()?;
        if delimiter.trim().is_empty() {
            return None;
        }
        let mut chars = delimiter.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(open), Some(close), None) => Some((open, close)),
            _ => None,
        }
    }
}
